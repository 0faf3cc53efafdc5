use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;

use crate::error::PulseError;
use crate::store::{reduce, ProfileAction, ProfileStore};
use crate::types::{Config, DataOrigin};
use crate::webhook::db::WebhookDb;

/// Outcome of the most recent background refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
    pub refreshed_at: String,
    pub source: DataOrigin,
    pub profile_count: usize,
}

/// Application state shared between the HTTP handlers and the refresh loop
pub struct AppState {
    pub config: Mutex<Option<Config>>,
    config_file: PathBuf,
    pub webhook_db: Mutex<Option<WebhookDb>>,
    pub profiles: Mutex<ProfileStore>,
    pub last_refresh: Mutex<Option<RefreshStatus>>,
    /// Wakes the refresh loop early, e.g. after a webhook batch lands.
    pub refresh_wake: Notify,
}

impl AppState {
    pub fn new() -> Self {
        let config_file = config_path().unwrap_or_else(|_| PathBuf::from("config.json"));
        let config = match load_config_from(&config_file) {
            Ok(c) => Some(c),
            Err(e) => {
                log::info!("{e}. Running with defaults (demo mode).");
                None
            }
        };

        let db_path = config
            .as_ref()
            .and_then(|c| c.server.database_path.clone())
            .map(PathBuf::from);
        let opened = match db_path {
            Some(path) => WebhookDb::open_at(path),
            None => WebhookDb::open(),
        };
        let db = match opened {
            Ok(db) => Some(db),
            Err(e) => {
                log::warn!("Failed to open webhook database: {e}. Webhook intake disabled.");
                None
            }
        };

        Self::with_parts(config, db, config_file)
    }

    /// Assemble state from already-loaded parts.
    pub fn with_parts(config: Option<Config>, db: Option<WebhookDb>, config_file: PathBuf) -> Self {
        Self {
            config: Mutex::new(config),
            config_file,
            webhook_db: Mutex::new(db),
            profiles: Mutex::new(ProfileStore::default()),
            last_refresh: Mutex::new(None),
            refresh_wake: Notify::new(),
        }
    }

    /// Effective config; defaults when no file was loaded.
    pub fn current_config(&self) -> Config {
        self.config.lock().clone().unwrap_or_default()
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Apply a store transition and return the new store.
    pub fn dispatch(&self, action: ProfileAction) -> ProfileStore {
        let mut guard = self.profiles.lock();
        let next = reduce(&guard, action);
        *guard = next.clone();
        next
    }

    pub fn profiles_snapshot(&self) -> ProfileStore {
        self.profiles.lock().clone()
    }

    /// Run `f` against the webhook database.
    pub fn with_webhook_db<T>(
        &self,
        f: impl FnOnce(&mut WebhookDb) -> Result<T, PulseError>,
    ) -> Result<T, PulseError> {
        let mut guard = self.webhook_db.lock();
        let db = guard
            .as_mut()
            .ok_or_else(|| PulseError::Storage("webhook database is not open".to_string()))?;
        f(db)
    }

    pub fn record_refresh(
        &self,
        source: DataOrigin,
        profile_count: usize,
        at: DateTime<Utc>,
    ) -> RefreshStatus {
        let status = RefreshStatus {
            refreshed_at: at.to_rfc3339_opts(SecondsFormat::Secs, true),
            source,
            profile_count,
        };
        *self.last_refresh.lock() = Some(status.clone());
        status
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the canonical config file path (~/.sahha-pulse/config.json)
pub fn config_path() -> Result<PathBuf, PulseError> {
    let home = dirs::home_dir()
        .ok_or_else(|| PulseError::Configuration("Could not find home directory".to_string()))?;
    Ok(home.join(".sahha-pulse").join("config.json"))
}

/// Create or update the config file.
///
/// Starts from the in-memory config (or serde defaults on first run), applies
/// the mutator, writes to a temp file and renames it over the old one, then
/// updates in-memory state.
pub fn create_or_update_config(
    state: &AppState,
    mutator: impl FnOnce(&mut Config),
) -> Result<Config, PulseError> {
    let mut guard = state.config.lock();
    let mut config = guard.clone().unwrap_or_default();

    mutator(&mut config);

    let path = state.config_file();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(&config)
        .map_err(|e| PulseError::Configuration(format!("Failed to serialize config: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;

    *guard = Some(config.clone());
    log::info!("Config written to {}", path.display());
    Ok(config)
}

/// Load configuration from ~/.sahha-pulse/config.json
pub fn load_config() -> Result<Config, PulseError> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config, PulseError> {
    if !path.exists() {
        return Err(PulseError::Configuration(format!(
            "Config file not found at {}",
            path.display()
        )));
    }

    let content = fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)
        .map_err(|e| PulseError::Configuration(format!("Failed to parse config: {e}")))?;

    if config.poll_interval_secs == 0 {
        return Err(PulseError::Configuration(
            "pollIntervalSecs must be at least 1".to_string(),
        ));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::{demo_identity, synthesize_profile};
    use crate::types::{Department, SahhaEnvironment};
    use crate::webhook::db::test_utils::test_db;

    fn temp_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::with_parts(None, Some(test_db()), dir.path().join("config.json"));
        (state, dir)
    }

    #[test]
    fn test_defaults_without_config() {
        let (state, _dir) = temp_state();
        let config = state.current_config();
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.demo_profile_count, 25);
        assert!(!config.sahha.is_complete());
    }

    #[test]
    fn test_create_or_update_config_round_trip() {
        let (state, _dir) = temp_state();
        create_or_update_config(&state, |c| {
            c.sahha.client_id = Some("id".into());
            c.sahha.client_secret = Some("secret".into());
            c.sahha.environment = SahhaEnvironment::Production;
            c.poll_interval_secs = 60;
        })
        .unwrap();

        let loaded = load_config_from(state.config_file()).unwrap();
        assert!(loaded.sahha.is_complete());
        assert_eq!(loaded.sahha.environment, SahhaEnvironment::Production);
        assert_eq!(loaded.poll_interval_secs, 60);
        assert_eq!(state.current_config().poll_interval_secs, 60);
    }

    #[test]
    fn test_load_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"sahha":{"clientId":"x"}}"#).unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8787");
        assert_eq!(config.demo_profile_count, 25);
        assert!(!config.sahha.is_complete());
    }

    #[test]
    fn test_load_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_config_from(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(PulseError::Configuration(_))));

        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"pollIntervalSecs":0}"#).unwrap();
        assert!(matches!(load_config_from(&path), Err(PulseError::Configuration(_))));
    }

    #[test]
    fn test_dispatch_updates_store() {
        let (state, _dir) = temp_state();
        let now = Utc::now();
        state.dispatch(ProfileAction::ReplaceProfiles(vec![synthesize_profile(
            demo_identity(1),
            now,
        )]));
        let store = state.dispatch(ProfileAction::AssignDepartment {
            profile_id: "demo_profile_1".into(),
            department: Department::Admin,
        });
        assert_eq!(store.department_of("demo_profile_1"), Department::Admin);
        assert_eq!(state.profiles_snapshot(), store);
    }

    #[test]
    fn test_with_webhook_db_without_db() {
        let state = AppState::with_parts(None, None, PathBuf::from("unused.json"));
        let result = state.with_webhook_db(|db| Ok(db.count()?));
        assert!(matches!(result, Err(PulseError::Storage(_))));
    }
}
