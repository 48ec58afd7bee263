//! Storage module for persisting harvest state
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Record identity, hash and download status
//! - Parent/child links between supplementary records
//! - Listing page progress
//! - Extracted document content

mod schema;
mod sqlite;
mod traits;

pub use schema::{get_schema_version, SCHEMA_VERSION};
pub use sqlite::SqliteStorage;
pub use traits::{PageTracker, RecordStore, StorageError, StorageResult};

use crate::state::{GroupClassification, RecordState};
use crate::HarvestError;
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Copies an existing database file into `backup_dir` with a timestamped name
///
/// Returns the backup path, or `None` if there was no database to copy yet.
pub fn backup_database(db_path: &Path, backup_dir: &Path) -> Result<Option<PathBuf>, HarvestError> {
    if !db_path.exists() {
        return Ok(None);
    }

    std::fs::create_dir_all(backup_dir)?;

    let stem = db_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "db".to_string());
    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S");
    let file_name = match db_path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, timestamp, ext.to_string_lossy()),
        None => format!("{}_{}", stem, timestamp),
    };

    let backup_path = backup_dir.join(file_name);
    std::fs::copy(db_path, &backup_path)?;
    Ok(Some(backup_path))
}

/// Process-wide handle to the single storage connection
///
/// Workers share one `SqliteStorage` behind a mutex. Each call to
/// [`SharedStorage::with`] holds the lock for exactly one store operation, so
/// writes are serialized and never interleave mid-statement. The closure is
/// synchronous, which keeps the lock from being held across an `.await`.
#[derive(Clone)]
pub struct SharedStorage {
    inner: Arc<Mutex<SqliteStorage>>,
}

impl SharedStorage {
    pub fn new(storage: SqliteStorage) -> Self {
        Self {
            inner: Arc::new(Mutex::new(storage)),
        }
    }

    /// Runs one storage operation under the lock
    ///
    /// The closure may return any error a `StorageError` converts into, so a
    /// multi-step pass such as linking can run under a single lock.
    pub fn with<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut SqliteStorage) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut guard = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        f(&mut *guard)
    }
}

/// A harvested listing entry as stored in the database
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub external_id: String,
    pub submitter: String,
    /// None when the listing date could not be parsed
    pub submitted_at: Option<NaiveDate>,
    pub submitter_reference: Option<String>,
    pub content_hash: Option<String>,
    pub downloaded: bool,
    pub classification: GroupClassification,
    pub discovered_at: String,
    pub parsed: bool,
}

impl Record {
    pub fn state(&self) -> RecordState {
        RecordState::derive(self.content_hash.is_some(), self.downloaded, self.parsed)
    }
}

/// A parent/child relationship between a submission and its amendment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLink {
    pub parent_id: i64,
    pub child_id: i64,
    pub order: u32,
}

/// Harvest progress for one listing page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRecord {
    pub page_number: u32,
    pub scraped: bool,
}

/// Extracted content of a record's documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedContent {
    pub text: String,
    /// Combined size of the source files in bytes
    pub size: u64,
    pub image_count: u64,
}
