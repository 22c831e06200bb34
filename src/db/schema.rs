//! Database schema and types

use crate::state_machine::RecipientId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS calls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    peer_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    had_video BOOLEAN NOT NULL,
    occurred_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_calls_occurred ON calls(occurred_at DESC);
";

/// History entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// Incoming call the user answered
    Received,
    /// Incoming call that ended without being answered
    Missed,
}

impl CallKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "received" => Some(CallKind::Received),
            "missed" => Some(CallKind::Missed),
            _ => None,
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallKind::Received => write!(f, "received"),
            CallKind::Missed => write!(f, "missed"),
        }
    }
}

/// One row of call history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: i64,
    pub peer: RecipientId,
    pub kind: CallKind,
    pub had_video: bool,
    pub occurred_at: DateTime<Utc>,
}
