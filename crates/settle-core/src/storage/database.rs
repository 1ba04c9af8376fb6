//! SQLite-backed practice history and key-value state.
//!
//! Provides persistent storage for:
//! - Completed activities (the practice history)
//! - Daily and all-time statistics
//! - A key-value store used for session snapshots and host state

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::activity::Activity;
use crate::error::Result;
use crate::storage::snapshot::SnapshotBackend;

/// One row of practice history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedActivity {
    pub id: i64,
    pub kind: String,
    pub activity_id: String,
    pub name: String,
    pub duration_secs: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Aggregated practice statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Stats {
    pub total_activities: u64,
    pub total_practice_secs: u64,
    pub today_activities: u64,
    pub today_practice_secs: u64,
}

/// SQLite database for practice history and app state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/settle/settle.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let path = data_dir()?.join("settle.db");
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &std::path::Path) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (tests and throwaway embedding).
    pub fn open_memory() -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> std::result::Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS completed_activities (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                kind          TEXT NOT NULL,
                activity_id   TEXT NOT NULL,
                name          TEXT NOT NULL DEFAULT '',
                duration_secs INTEGER NOT NULL,
                started_at    TEXT NOT NULL,
                completed_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_completed_at ON completed_activities(completed_at);
            CREATE INDEX IF NOT EXISTS idx_completed_kind ON completed_activities(kind);",
        )?;
        Ok(())
    }

    /// Record a completed activity into the history.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_activity(
        &self,
        activity: &Activity,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> std::result::Result<i64, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO completed_activities
                 (kind, activity_id, name, duration_secs, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                activity.kind().label(),
                activity.id,
                activity.name,
                u64::from(activity.duration_secs),
                started_at.to_rfc3339(),
                completed_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn stats(&self) -> std::result::Result<Stats, rusqlite::Error> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let midnight = format!("{today}T00:00:00+00:00");
        let (today_activities, today_practice_secs) = self.totals_since(Some(&midnight))?;
        let (total_activities, total_practice_secs) = self.totals_since(None)?;
        Ok(Stats {
            total_activities,
            total_practice_secs,
            today_activities,
            today_practice_secs,
        })
    }

    fn totals_since(
        &self,
        since: Option<&str>,
    ) -> std::result::Result<(u64, u64), rusqlite::Error> {
        match since {
            Some(bound) => self.conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(duration_secs), 0)
                 FROM completed_activities WHERE completed_at >= ?1",
                params![bound],
                |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
            ),
            None => self.conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(duration_secs), 0)
                 FROM completed_activities",
                [],
                |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
            ),
        }
    }

    /// Most recent history rows, newest first.
    pub fn recent_activities(
        &self,
        limit: u32,
    ) -> std::result::Result<Vec<CompletedActivity>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, activity_id, name, duration_secs, started_at, completed_at
             FROM completed_activities ORDER BY completed_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(CompletedActivity {
                id: row.get(0)?,
                kind: row.get(1)?,
                activity_id: row.get(2)?,
                name: row.get(3)?,
                duration_secs: row.get(4)?,
                started_at: row
                    .get::<_, String>(5)?
                    .parse()
                    .unwrap_or_else(|_| Utc::now()),
                completed_at: row
                    .get::<_, String>(6)?
                    .parse()
                    .unwrap_or_else(|_| Utc::now()),
            })
        })?;
        rows.collect()
    }

    // ── Key-value store ──────────────────────────────────────────────────

    pub fn kv_get(&self, key: &str) -> std::result::Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
    }

    pub fn kv_set(&self, key: &str, value: &str) -> std::result::Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> std::result::Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl SnapshotBackend for Database {
    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.kv_set(key, value)?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.kv_get(key)?)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.kv_delete(key)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Library;

    #[test]
    fn kv_roundtrip_and_overwrite() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("missing").unwrap().is_none());

        db.kv_set("snapshot:sos", "first").unwrap();
        db.kv_set("snapshot:sos", "second").unwrap();
        assert_eq!(db.kv_get("snapshot:sos").unwrap().as_deref(), Some("second"));

        db.kv_delete("snapshot:sos").unwrap();
        assert!(db.kv_get("snapshot:sos").unwrap().is_none());
    }

    #[test]
    fn history_feeds_stats() {
        let db = Database::open_memory().unwrap();
        let library = Library::builtin();
        let breathing = Activity::from_breathing(&library, "box").unwrap();
        let focus = Activity::from_focus(&library, "gentle-start").unwrap();

        let now = Utc::now();
        db.record_activity(&breathing, now, now).unwrap();
        db.record_activity(&focus, now, now).unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_activities, 2);
        assert_eq!(
            stats.total_practice_secs,
            u64::from(breathing.duration_secs) + u64::from(focus.duration_secs)
        );
        assert_eq!(stats.today_activities, 2);
    }

    #[test]
    fn recent_returns_newest_first() {
        let db = Database::open_memory().unwrap();
        let library = Library::builtin();
        let activity = Activity::from_breathing(&library, "box").unwrap();

        let earlier = Utc::now() - chrono::Duration::hours(2);
        let later = Utc::now();
        db.record_activity(&activity, earlier, earlier).unwrap();
        db.record_activity(&activity, later, later).unwrap();

        let recent = db.recent_activities(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].completed_at >= recent[1].completed_at);
    }
}
