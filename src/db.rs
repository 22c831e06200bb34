//! Call history persistence
//!
//! SQLite store behind the runtime's [`CallLog`](crate::runtime::CallLog)
//! collaborator.

mod schema;

pub use schema::*;

use crate::state_machine::RecipientId;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Could not create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database connection lock poisoned")]
    Poisoned,
    #[error("Unknown call kind in history: {0}")]
    UnknownKind(String),
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
        if let Some(dir) = path.as_ref().parent() {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Append a history row
    pub fn insert_call(
        &self,
        peer: RecipientId,
        kind: CallKind,
        had_video: bool,
        occurred_at: DateTime<Utc>,
    ) -> DbResult<CallRecord> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO calls (peer_id, kind, had_video, occurred_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                peer_to_sql(peer),
                kind.to_string(),
                had_video,
                occurred_at.to_rfc3339()
            ],
        )?;

        Ok(CallRecord {
            id: conn.last_insert_rowid(),
            peer,
            kind,
            had_video,
            occurred_at,
        })
    }

    /// All history, newest first
    pub fn list_calls(&self) -> DbResult<Vec<CallRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, peer_id, kind, had_video, occurred_at
             FROM calls ORDER BY occurred_at DESC, id DESC",
        )?;

        let rows = stmt.query_map([], parse_call_row)?;
        collect_records(rows)
    }
}

type RawRow = (i64, RecipientId, String, bool, DateTime<Utc>);

fn parse_call_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        peer_from_sql(row.get(1)?),
        row.get(2)?,
        row.get(3)?,
        parse_datetime(&row.get::<_, String>(4)?),
    ))
}

fn collect_records(
    rows: impl Iterator<Item = rusqlite::Result<RawRow>>,
) -> DbResult<Vec<CallRecord>> {
    rows.map(|row| {
        let (id, peer, kind, had_video, occurred_at) = row?;
        let kind = CallKind::parse(&kind).ok_or(DbError::UnknownKind(kind))?;
        Ok(CallRecord {
            id,
            peer,
            kind,
            had_video,
            occurred_at,
        })
    })
    .collect()
}

/// SQLite integers are signed; ids round-trip through the same bits
#[allow(clippy::cast_possible_wrap)]
fn peer_to_sql(peer: RecipientId) -> i64 {
    peer.0 as i64
}

#[allow(clippy::cast_sign_loss)]
fn peer_from_sql(raw: i64) -> RecipientId {
    RecipientId(raw as u64)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
