//! Background profile refresh.
//!
//! Each tick rebuilds the profile store from the best available source:
//! webhook-delivered profiles first, then the live Sahha API when credentials
//! are configured, then the deterministic demo roster. A tick that overruns
//! the poll interval is dropped; the next one starts fresh.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::PulseError;
use crate::sahha_api::{fetch_or_synthesize, SahhaClient, SyntheticSource};
use crate::state::{AppState, RefreshStatus};
use crate::store::ProfileAction;
use crate::synthesis;
use crate::types::{DataOrigin, Department, Profile, SahhaCredentials};

// ---------------------------------------------------------------------------
// Single refresh
// ---------------------------------------------------------------------------

/// Profiles stored through the webhook, with the departments they carried.
fn webhook_profiles(
    state: &AppState,
    now: DateTime<Utc>,
) -> Result<(Vec<Profile>, Vec<(String, Department)>), PulseError> {
    let stored = state.with_webhook_db(|db| Ok(db.list_profiles()?))?;
    let seeds = stored
        .iter()
        .filter_map(|s| {
            let department = s.department.as_deref().and_then(Department::parse)?;
            Some((s.profile_id.clone(), department))
        })
        .collect();
    let profiles = stored.iter().map(|s| s.to_profile(now)).collect();
    Ok((profiles, seeds))
}

fn demo_seeds(profiles: &[Profile]) -> Vec<(String, Department)> {
    profiles
        .iter()
        .filter(|p| p.origin == DataOrigin::Demo)
        .map(|p| (p.profile_id().to_string(), synthesis::demo_department(p.profile_id())))
        .collect()
}

/// Rebuild the profile store once.
///
/// User-made department assignments and display-id edits survive. Seeds
/// replace earlier seeds, so a re-delivered webhook department takes effect.
pub async fn refresh_once(
    state: &AppState,
    live: Option<&SahhaClient>,
    now: DateTime<Utc>,
) -> RefreshStatus {
    let demo = SyntheticSource {
        count: state.current_config().demo_profile_count,
    };

    let webhook = match webhook_profiles(state, now) {
        Ok(found) => Some(found),
        Err(e) => {
            log::warn!("Webhook store unavailable during refresh: {e}");
            None
        }
    };

    let (profiles, seeds) = match webhook {
        Some((profiles, seeds)) if !profiles.is_empty() => (profiles, seeds),
        _ => {
            let profiles = match live {
                Some(client) => fetch_or_synthesize(client, &demo, now).await,
                None => synthesis::demo_roster(demo.count, now),
            };
            let seeds = demo_seeds(&profiles);
            (profiles, seeds)
        }
    };

    let source = profiles
        .first()
        .map(|p| p.origin)
        .unwrap_or(DataOrigin::Demo);
    let count = profiles.len();

    state.dispatch(ProfileAction::ReplaceProfiles(profiles));
    state.dispatch(ProfileAction::SeedAssignments(seeds));
    log::info!("Profile refresh: {} profile(s) from {:?}", count, source);
    state.record_refresh(source, count, now)
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

/// Live client for the current credentials, rebuilt only when they change.
fn sync_client(
    cached: &mut Option<(SahhaCredentials, SahhaClient)>,
    credentials: &SahhaCredentials,
) {
    if !credentials.is_complete() {
        *cached = None;
        return;
    }
    if cached.as_ref().is_some_and(|(c, _)| c == credentials) {
        return;
    }
    *cached = match SahhaClient::new(credentials) {
        Ok(client) => {
            log::info!("Sahha client configured for {:?}", credentials.environment);
            Some((credentials.clone(), client))
        }
        Err(e) => {
            log::warn!("Sahha client unavailable: {e}");
            None
        }
    };
}

/// Background refresh loop.
///
/// - Refresh immediately, then every `pollIntervalSecs`
/// - Each tick is bounded by the interval and dropped on timeout (no retry)
/// - `state.refresh_wake` triggers an early tick
pub async fn run_refresh_loop(state: Arc<AppState>) {
    let mut client: Option<(SahhaCredentials, SahhaClient)> = None;

    loop {
        let config = state.current_config();
        let interval = Duration::from_secs(config.poll_interval_secs.max(1));
        sync_client(&mut client, &config.sahha);

        let tick = refresh_once(&state, client.as_ref().map(|(_, c)| c), Utc::now());
        if tokio::time::timeout(interval, tick).await.is_err() {
            log::warn!(
                "Profile refresh exceeded {}s and was dropped",
                interval.as_secs()
            );
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {},
            _ = state.refresh_wake.notified() => {
                log::debug!("Refresh loop woken early");
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::types::Config;
    use crate::webhook::db::test_utils::test_db;

    fn state_with(demo_profile_count: usize) -> AppState {
        let config = Config {
            demo_profile_count,
            ..Default::default()
        };
        AppState::with_parts(Some(config), Some(test_db()), PathBuf::from("unused.json"))
    }

    fn push(state: &AppState, body: &str) {
        state
            .with_webhook_db(|db| crate::webhook::ingest(db, body.as_bytes(), Utc::now()))
            .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_without_sources_uses_demo() {
        let state = state_with(6);
        let status = refresh_once(&state, None, Utc::now()).await;
        assert_eq!(status.source, DataOrigin::Demo);
        assert_eq!(status.profile_count, 6);

        let store = state.profiles_snapshot();
        assert_eq!(store.len(), 6);
        assert_eq!(
            store.department_of("demo_profile_1"),
            synthesis::demo_department("demo_profile_1")
        );
        assert!(state.last_refresh.lock().is_some());
    }

    #[tokio::test]
    async fn test_webhook_profiles_take_priority() {
        let state = state_with(6);
        push(
            &state,
            r#"{"event":"profiles.updated","data":{"profiles":[
                {"profileId":"w1","scores":{"activity":0.5},"department":"sales"},
                {"profileId":"w2","activityScore":72}
            ]}}"#,
        );

        let status = refresh_once(&state, None, Utc::now()).await;
        assert_eq!(status.source, DataOrigin::Webhook);
        assert_eq!(status.profile_count, 2);

        let store = state.profiles_snapshot();
        assert_eq!(store.get("w1").unwrap().scores.activity, Some(50.0));
        assert_eq!(store.department_of("w1"), Department::Sales);
        assert_eq!(store.department_of("w2"), Department::Unassigned);
    }

    #[tokio::test]
    async fn test_refresh_keeps_user_assignments() {
        let state = state_with(3);
        refresh_once(&state, None, Utc::now()).await;
        state.dispatch(ProfileAction::AssignDepartment {
            profile_id: "demo_profile_2".into(),
            department: Department::Admin,
        });
        state.dispatch(ProfileAction::EditDisplayId {
            profile_id: "demo_profile_2".into(),
            editable_id: "Front desk".into(),
        });

        refresh_once(&state, None, Utc::now()).await;
        let store = state.profiles_snapshot();
        assert_eq!(store.department_of("demo_profile_2"), Department::Admin);
        assert_eq!(store.get("demo_profile_2").unwrap().identity.editable_id, "Front desk");
    }

    #[tokio::test]
    async fn test_webhook_redelivery_moves_department() {
        let state = state_with(3);
        refresh_once(&state, None, Utc::now()).await;
        assert!(state.profiles_snapshot().assignment("demo_profile_1").is_some());

        push(
            &state,
            r#"{"event":"profiles.updated","data":{"profiles":[
                {"profileId":"w1","department":"sales"},
                {"profileId":"w2","department":"sales"}
            ]}}"#,
        );
        refresh_once(&state, None, Utc::now()).await;
        assert_eq!(state.profiles_snapshot().department_of("w1"), Department::Sales);
        state.dispatch(ProfileAction::AssignDepartment {
            profile_id: "w2".into(),
            department: Department::Admin,
        });

        push(
            &state,
            r#"{"event":"profiles.updated","data":{"profiles":[
                {"profileId":"w1","department":"tech"},
                {"profileId":"w2","department":"tech"}
            ]}}"#,
        );
        refresh_once(&state, None, Utc::now()).await;

        let store = state.profiles_snapshot();
        assert_eq!(store.department_of("w1"), Department::Tech);
        assert_eq!(store.department_of("w2"), Department::Admin);
        // Demo seeds went away with the demo roster.
        assert_eq!(store.assignment("demo_profile_1"), None);
    }

    #[test]
    fn test_sync_client_follows_credentials() {
        let mut cached = None;
        sync_client(&mut cached, &SahhaCredentials::default());
        assert!(cached.is_none());

        let creds = SahhaCredentials {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            ..Default::default()
        };
        sync_client(&mut cached, &creds);
        assert!(cached.is_some());

        sync_client(&mut cached, &SahhaCredentials::default());
        assert!(cached.is_none());
    }
}
