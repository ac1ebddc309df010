//! Persisted processed-markers for the report pipelines.
//!
//! The eligibility windows only approximate at-most-once execution: a slow
//! cycle or a restart inside a window can run a pipeline twice. When a
//! marker database is configured, each `(election, phase)` is recorded
//! after a fully successful run and skipped forever after, closing that
//! gap. The store survives process restarts.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use thiserror::Error;

use crate::client::ElectionId;
use crate::report::ReportPhase;

/// Schema for the processed-marker store.
const MARKER_SCHEMA_SQL: &str = r"
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;

    CREATE TABLE IF NOT EXISTS processed_reports (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        election_id INTEGER NOT NULL,
        phase TEXT NOT NULL,
        processed_at INTEGER NOT NULL,
        UNIQUE(election_id, phase)
    );

    CREATE INDEX IF NOT EXISTS idx_processed_election
        ON processed_reports(election_id);
";

/// Errors from the marker store.
#[derive(Debug, Error)]
pub enum MarkerStoreError {
    /// Database open/query error.
    #[error("marker store error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for MarkerStoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Database(value.to_string())
    }
}

/// SQLite-backed record of which report pipelines already ran.
pub struct ProcessedMarkerStore {
    conn: Arc<Mutex<Connection>>,
}

impl ProcessedMarkerStore {
    /// Opens or creates a marker store at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`MarkerStoreError`] when the database cannot be opened or
    /// the schema cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MarkerStoreError> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch(MARKER_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns [`MarkerStoreError`] when the schema cannot be applied.
    pub fn in_memory() -> Result<Self, MarkerStoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(MARKER_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Whether a pipeline already ran for this election.
    ///
    /// # Errors
    ///
    /// Returns [`MarkerStoreError`] on query failure.
    #[allow(clippy::cast_possible_wrap)] // Election ids fit SQLite integers
    pub fn is_processed(
        &self,
        election_id: ElectionId,
        phase: ReportPhase,
    ) -> Result<bool, MarkerStoreError> {
        let conn = self.conn.lock().expect("marker store lock poisoned");
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM processed_reports WHERE election_id = ?1 AND phase = ?2",
                params![election_id as i64, phase.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Records a successful pipeline run.
    ///
    /// Recording the same `(election, phase)` again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`MarkerStoreError`] on insert failure.
    #[allow(clippy::cast_possible_wrap)] // Election ids fit SQLite integers
    pub fn mark_processed(
        &self,
        election_id: ElectionId,
        phase: ReportPhase,
        processed_at_unix: i64,
    ) -> Result<(), MarkerStoreError> {
        let conn = self.conn.lock().expect("marker store lock poisoned");
        conn.execute(
            "INSERT OR IGNORE INTO processed_reports (election_id, phase, processed_at)
             VALUES (?1, ?2, ?3)",
            params![election_id as i64, phase.as_str(), processed_at_unix],
        )?;
        Ok(())
    }
}

impl std::fmt::Debug for ProcessedMarkerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessedMarkerStore").finish_non_exhaustive()
    }
}
