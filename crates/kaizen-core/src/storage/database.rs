//! SQLite-based session storage and statistics.
//!
//! Provides persistent storage for:
//! - Completed focus sessions from both engines
//! - Session statistics (today and all-time)
//! - Key-value store for engine snapshots

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::{data_dir, migrations};
use crate::error::{DatabaseError, Result};
use crate::ports::{KeyValueStore, SessionPayload, SessionStats, SessionStore, TimerType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub tag: String,
    pub focus_seconds: u64,
    pub break_seconds: u64,
    pub ratio: f64,
    pub timer_type: TimerType,
    pub created_at: DateTime<Utc>,
}

/// SQLite database for session storage.
///
/// Stores completed sessions and engine snapshots, and provides statistics.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/kaizen/kaizen.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("kaizen.db"))
    }

    /// Open (or create) the database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database for headless use and tests.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Record a completed session stamped with the current time.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_session(&self, payload: &SessionPayload) -> Result<i64> {
        self.record_session_at(payload, Utc::now())
    }

    /// Record a completed session with an explicit timestamp.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_session_at(
        &self,
        payload: &SessionPayload,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO focus_sessions (tag, focus_seconds, break_seconds, ratio, timer_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                payload.tag,
                payload.focus_seconds,
                payload.break_seconds,
                payload.ratio,
                payload.timer_type.as_str(),
                created_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent sessions first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row is malformed.
    pub fn sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tag, focus_seconds, break_seconds, ratio, timer_type, created_at
             FROM focus_sessions
             ORDER BY created_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, u64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, tag, focus_seconds, break_seconds, ratio, timer_type, created_at) = row?;
            let timer_type = timer_type
                .parse::<TimerType>()
                .map_err(DatabaseError::QueryFailed)?;
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| DatabaseError::QueryFailed(format!("bad created_at: {e}")))?
                .with_timezone(&Utc);
            records.push(SessionRecord {
                id,
                tag,
                focus_seconds,
                break_seconds,
                ratio,
                timer_type,
                created_at,
            });
        }
        Ok(records)
    }

    /// Lifetime totals plus today's (UTC) focus.
    ///
    /// # Errors
    /// Returns an error if a query fails.
    pub fn stats_all(&self) -> Result<SessionStats> {
        let (total_sessions, total_focus_secs, total_break_secs, total_days) = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(focus_seconds), 0),
                    COALESCE(SUM(break_seconds), 0),
                    COUNT(DISTINCT substr(created_at, 1, 10))
             FROM focus_sessions",
            [],
            |row| {
                Ok((
                    row.get::<_, u64>(0)?,
                    row.get::<_, u64>(1)?,
                    row.get::<_, u64>(2)?,
                    row.get::<_, u64>(3)?,
                ))
            },
        )?;

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let (today_sessions, today_focus_secs) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(focus_seconds), 0)
             FROM focus_sessions
             WHERE created_at >= ?1",
            params![format!("{today}T00:00:00+00:00")],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;

        Ok(SessionStats {
            total_sessions,
            total_focus_secs,
            total_break_secs,
            total_days,
            today_sessions,
            today_focus_secs,
        })
    }

    /// Get a value from the kv store.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SessionStore for Database {
    fn record(&self, payload: &SessionPayload) -> Result<i64> {
        self.record_session(payload)
    }

    fn stats(&self) -> Result<SessionStats> {
        self.stats_all()
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.kv_get(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.kv_set(key, value)
    }
}
