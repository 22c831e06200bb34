//! Runtime configuration from the environment

use std::path::PathBuf;

const DEFAULT_QUEUE_DEPTH: usize = 64;
const DEFAULT_SNAPSHOT_BUFFER: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallConfig {
    /// Relay all media through TURN, even for known contacts
    pub always_relay: bool,
    pub db_path: PathBuf,
    /// Capacity of the action queue
    pub queue_depth: usize,
    /// Capacity of the snapshot broadcast channel
    pub snapshot_buffer: usize,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            always_relay: false,
            db_path: PathBuf::from("/tmp/.switchboard/calls.db"),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            snapshot_buffer: DEFAULT_SNAPSHOT_BUFFER,
        }
    }
}

impl CallConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparseable values fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("SWITCHBOARD_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.switchboard/calls.db"))
            },
            PathBuf::from,
        );

        Self {
            always_relay: lookup("SWITCHBOARD_ALWAYS_RELAY").is_some_and(|v| parse_flag(&v)),
            db_path,
            queue_depth: parse_capacity(lookup("SWITCHBOARD_QUEUE_DEPTH"), DEFAULT_QUEUE_DEPTH),
            snapshot_buffer: parse_capacity(
                lookup("SWITCHBOARD_SNAPSHOT_BUFFER"),
                DEFAULT_SNAPSHOT_BUFFER,
            ),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Channel capacities must be non-zero
fn parse_capacity(value: Option<String>, default: usize) -> usize {
    value
        .and_then(|v| v.trim().parse().ok())
        .filter(|&n: &usize| n > 0)
        .unwrap_or(default)
}
