//! Database module for the hotel wizard
//!
//! Append-only audit log of completed searches.

mod schema;

pub use schema::*;

use crate::state_machine::{SearchCommand, UserId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // ==================== Search History ====================

    /// Append a completed search
    pub fn append_search(&self, record: &SearchRecord) -> DbResult<i64> {
        let results = serde_json::to_string(&record.results)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO search_history (user_id, created_at, command, destination, results)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.user_id.0,
                record.created_at.to_rfc3339(),
                record.command.name(),
                record.destination,
                results,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// A user's most recent searches, newest first
    pub fn recent_searches(&self, user_id: UserId, limit: usize) -> DbResult<Vec<SearchRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, created_at, command, destination, results
             FROM search_history
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![user_id.0, limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (user_id, created_at, command, destination, results) = row?;
            let Some(command) = SearchCommand::from_name(&command) else {
                tracing::warn!(command = %command, "Skipping history row with unknown command");
                continue;
            };
            records.push(SearchRecord {
                user_id: UserId(user_id),
                created_at: parse_datetime(&created_at),
                command,
                destination,
                results: serde_json::from_str(&results)?,
            });
        }
        Ok(records)
    }

    /// Number of stored searches for a user
    #[allow(dead_code)] // Used in tests
    pub fn count_searches(&self, user_id: UserId) -> DbResult<i64> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM search_history WHERE user_id = ?1",
            params![user_id.0],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
