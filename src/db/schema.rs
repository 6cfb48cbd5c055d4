//! Database schema and types

use crate::provider::HotelResult;
use crate::state_machine::{SearchCommand, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS search_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    command TEXT NOT NULL,
    destination TEXT NOT NULL,
    results TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_search_history_user ON search_history(user_id, created_at DESC);
";

/// One completed search, as appended to the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub command: SearchCommand,
    /// City name as the user picked it
    pub destination: String,
    pub results: Vec<HotelResult>,
}
