//! SQLite store for profiles pushed through the webhook.
//!
//! The database lives at `~/.sahha-pulse/webhook.db` unless the config points
//! elsewhere. Writes are last-write-wins per `profile_id`; there is no
//! ordering guarantee between concurrent batches.

use std::path::PathBuf;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::types::HealthScores;

use super::StoredProfile;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS webhook_profiles (
    profile_id       TEXT PRIMARY KEY,
    external_id      TEXT NOT NULL,
    editable_id      TEXT,
    wellbeing        REAL,
    activity         REAL,
    sleep            REAL,
    mental_wellbeing REAL,
    readiness        REAL,
    department       TEXT,
    event            TEXT NOT NULL,
    received_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS webhook_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const LAST_UPDATED_KEY: &str = "last_updated";

/// SQLite connection wrapper for webhook-delivered profiles.
///
/// Not `Sync`; held behind a mutex in `AppState`.
pub struct WebhookDb {
    conn: Connection,
}

impl WebhookDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Open (or create) the database at the default path and apply the schema.
    pub fn open() -> Result<Self, DbError> {
        let path = Self::db_path()?;
        Self::open_at(path)
    }

    /// Open a database at an explicit path.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch(SCHEMA)?;
        log::debug!("Webhook store opened at {}", path.display());
        Ok(Self { conn })
    }

    /// `~/.sahha-pulse/webhook.db`
    pub fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".sahha-pulse").join("webhook.db"))
    }

    /// Insert or replace a batch of profiles and stamp `last_updated`.
    ///
    /// The whole batch commits or none of it does.
    pub fn upsert_profiles(&mut self, profiles: &[StoredProfile], updated_at: &str) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO webhook_profiles
                    (profile_id, external_id, editable_id, wellbeing, activity, sleep,
                     mental_wellbeing, readiness, department, event, received_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(profile_id) DO UPDATE SET
                    external_id = excluded.external_id,
                    editable_id = excluded.editable_id,
                    wellbeing = excluded.wellbeing,
                    activity = excluded.activity,
                    sleep = excluded.sleep,
                    mental_wellbeing = excluded.mental_wellbeing,
                    readiness = excluded.readiness,
                    department = excluded.department,
                    event = excluded.event,
                    received_at = excluded.received_at",
            )?;
            for p in profiles {
                stmt.execute(params![
                    p.profile_id,
                    p.external_id,
                    p.editable_id,
                    p.scores.wellbeing,
                    p.scores.activity,
                    p.scores.sleep,
                    p.scores.mental_wellbeing,
                    p.scores.readiness,
                    p.department,
                    p.event,
                    p.received_at,
                ])?;
            }
        }
        tx.execute(
            "INSERT INTO webhook_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![LAST_UPDATED_KEY, updated_at],
        )?;
        tx.commit()?;
        Ok(profiles.len())
    }

    /// All stored profiles in first-seen order.
    pub fn list_profiles(&self) -> Result<Vec<StoredProfile>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT profile_id, external_id, editable_id, wellbeing, activity, sleep,
                    mental_wellbeing, readiness, department, event, received_at
             FROM webhook_profiles
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredProfile {
                profile_id: row.get(0)?,
                external_id: row.get(1)?,
                editable_id: row.get(2)?,
                scores: HealthScores {
                    wellbeing: row.get(3)?,
                    activity: row.get(4)?,
                    sleep: row.get(5)?,
                    mental_wellbeing: row.get(6)?,
                    readiness: row.get(7)?,
                },
                department: row.get(8)?,
                event: row.get(9)?,
                received_at: row.get(10)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    pub fn count(&self) -> Result<usize, DbError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM webhook_profiles", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Timestamp of the most recent accepted batch, if any.
    pub fn last_updated(&self) -> Result<Option<String>, DbError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM webhook_meta WHERE key = ?1",
                [LAST_UPDATED_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Remove every stored profile. Returns how many were deleted.
    pub fn clear(&mut self, cleared_at: &str) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        let deleted = tx.execute("DELETE FROM webhook_profiles", [])?;
        tx.execute(
            "INSERT INTO webhook_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![LAST_UPDATED_KEY, cleared_at],
        )?;
        tx.commit()?;
        Ok(deleted)
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::WebhookDb;

    /// Create a temporary database for testing.
    ///
    /// We leak the `TempDir` so the directory persists for the duration of the test.
    pub fn test_db() -> WebhookDb {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("webhook-test.db");
        std::mem::forget(dir);
        WebhookDb::open_at(path).expect("Failed to open test database")
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::test_db;
    use super::*;

    fn stored(id: &str, activity: Option<f64>) -> StoredProfile {
        StoredProfile {
            profile_id: id.to_string(),
            external_id: format!("ext-{id}"),
            editable_id: None,
            scores: HealthScores {
                wellbeing: Some(61.0),
                activity,
                sleep: None,
                mental_wellbeing: Some(70.5),
                readiness: Some(44.0),
            },
            department: Some("sales".to_string()),
            event: "profiles.updated".to_string(),
            received_at: "2025-05-01T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_open_creates_tables() {
        let db = test_db();
        assert_eq!(db.count().unwrap(), 0);
        assert_eq!(db.last_updated().unwrap(), None);
        let meta: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM webhook_meta", [], |row| row.get(0))
            .expect("webhook_meta should exist");
        assert_eq!(meta, 0);
    }

    #[test]
    fn test_upsert_and_list_preserves_fields() {
        let mut db = test_db();
        let batch = vec![stored("a", Some(30.0)), stored("b", None)];
        db.upsert_profiles(&batch, "2025-05-01T10:00:00Z").unwrap();

        let listed = db.list_profiles().unwrap();
        assert_eq!(listed, batch);
        assert_eq!(db.last_updated().unwrap().as_deref(), Some("2025-05-01T10:00:00Z"));
    }

    #[test]
    fn test_upsert_replaces_same_profile_id() {
        let mut db = test_db();
        db.upsert_profiles(&[stored("a", Some(30.0)), stored("b", Some(40.0))], "t1")
            .unwrap();
        db.upsert_profiles(&[stored("a", Some(88.0))], "t2").unwrap();

        let listed = db.list_profiles().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].profile_id, "a");
        assert_eq!(listed[0].scores.activity, Some(88.0));
        assert_eq!(db.last_updated().unwrap().as_deref(), Some("t2"));
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut db = test_db();
        db.upsert_profiles(&[stored("a", None), stored("b", None)], "t1").unwrap();
        assert_eq!(db.clear("t2").unwrap(), 2);
        assert_eq!(db.count().unwrap(), 0);
        assert_eq!(db.last_updated().unwrap().as_deref(), Some("t2"));
    }
}
