//! Storage traits and error types
//!
//! This module defines the capability interfaces the harvester needs from its
//! storage backend: a record store and a page progress tracker.

use crate::state::GroupClassification;
use crate::storage::{PageRecord, ParsedContent, Record, RecordLink};
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// A concurrent writer created the same external identifier first
    #[error("Duplicate record: {0}")]
    DuplicateRecord(String),

    /// Refused to flag a record downloaded before its hash was resolved
    #[error("Record {0} has no content hash")]
    HashMissing(String),

    /// Supplementary children share their parent's classification
    #[error("Record {0} is a supplementary child; classify its parent instead")]
    LinkedChild(String),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Identity and lifecycle of harvested records and their links
///
/// Every method is a single statement or a single transaction, so each call
/// commits independently of the caller's surrounding work.
pub trait RecordStore {
    // ===== Identity =====

    /// Checks whether a record with this external identifier exists
    fn exists(&self, external_id: &str) -> StorageResult<bool>;

    /// Creates a new record with no hash and download status false
    ///
    /// Fails with `StorageError::DuplicateRecord` when the identifier already
    /// exists. Callers should use [`RecordStore::ensure_record`] instead.
    fn create(
        &mut self,
        external_id: &str,
        submitter: &str,
        submitted_at: Option<NaiveDate>,
    ) -> StorageResult<i64>;

    /// Creates the record unless it already exists
    ///
    /// Returns the internal id and whether this call created it. A
    /// `DuplicateRecord` from a lost race resolves to the existing id.
    fn ensure_record(
        &mut self,
        external_id: &str,
        submitter: &str,
        submitted_at: Option<NaiveDate>,
    ) -> StorageResult<(i64, bool)> {
        if let Some(id) = self.get_record_id(external_id)? {
            return Ok((id, false));
        }

        match self.create(external_id, submitter, submitted_at) {
            Ok(id) => Ok((id, true)),
            Err(StorageError::DuplicateRecord(_)) => {
                let id = self
                    .get_record_id(external_id)?
                    .ok_or_else(|| StorageError::RecordNotFound(external_id.to_string()))?;
                Ok((id, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Looks up the internal id for an external identifier
    fn get_record_id(&self, external_id: &str) -> StorageResult<Option<i64>>;

    /// Fetches the full record for an external identifier
    fn get_record(&self, external_id: &str) -> StorageResult<Option<Record>>;

    /// Overwrites the submission date; the listing is authoritative
    fn refresh_submitted_at(
        &mut self,
        external_id: &str,
        submitted_at: Option<NaiveDate>,
    ) -> StorageResult<()>;

    /// Stores the token needed to reopen the record's detail page
    fn set_submitter_reference(&mut self, external_id: &str, reference: &str)
        -> StorageResult<()>;

    // ===== Hash and download =====

    fn get_hash(&self, external_id: &str) -> StorageResult<Option<String>>;

    fn set_hash(&mut self, external_id: &str, hash: &str) -> StorageResult<()>;

    fn is_downloaded(&self, external_id: &str) -> StorageResult<bool>;

    /// Marks the document as durably stored
    ///
    /// Fails with `StorageError::HashMissing` if the hash is still unresolved.
    fn flag_downloaded(&mut self, external_id: &str) -> StorageResult<()>;

    /// Records that still need their document, in discovery order
    fn list_undownloaded(&self) -> StorageResult<Vec<Record>>;

    // ===== Top-level records and links =====

    /// Records that are not the child of any link
    fn list_top_level(&self) -> StorageResult<Vec<Record>>;

    /// Top-level records still awaiting review
    fn list_top_level_unclassified(&self) -> StorageResult<Vec<Record>>;

    /// Children of a record, ordered by link order ascending
    fn list_children(&self, parent_id: i64) -> StorageResult<Vec<Record>>;

    /// Records a reviewer verdict on a top-level record
    ///
    /// Fails with `StorageError::LinkedChild` for a record that is linked to a parent.
    fn set_group_classification(
        &mut self,
        external_id: &str,
        classification: GroupClassification,
    ) -> StorageResult<()>;

    /// Top-level records whose label carries a "Supp " marker
    fn list_supplementary_candidates(&self) -> StorageResult<Vec<Record>>;

    /// Finds the top-level record a supplementary label belongs to
    ///
    /// Prefers an exact submitter and date match, then the latest record of
    /// that submitter dated on or before `submitted_at`.
    fn find_parent(&self, submitter: &str, submitted_at: NaiveDate)
        -> StorageResult<Option<i64>>;

    /// Links a child record to its parent
    ///
    /// A new link clears the child's own classification. Returns false
    /// without error if the child is already linked.
    fn insert_link(&mut self, parent_id: i64, child_id: i64, order: u32) -> StorageResult<bool>;

    /// The link that makes `child_id` a child, if any
    fn get_parent_link(&self, child_id: i64) -> StorageResult<Option<RecordLink>>;

    // ===== Content =====

    /// Downloaded top-level records without extracted content
    fn list_unparsed(&self) -> StorageResult<Vec<Record>>;

    fn set_content(&mut self, record_id: i64, content: &ParsedContent) -> StorageResult<()>;

    fn clear_all_content(&mut self) -> StorageResult<usize>;

    // ===== Statistics =====

    fn count_records(&self) -> StorageResult<u64>;

    fn count_hashed(&self) -> StorageResult<u64>;

    fn count_downloaded(&self) -> StorageResult<u64>;

    fn count_parsed(&self) -> StorageResult<u64>;

    fn count_links(&self) -> StorageResult<u64>;

    /// Top-level record counts per classification
    fn classification_breakdown(&self) -> StorageResult<HashMap<GroupClassification, u64>>;
}

/// Harvest progress of the paginated listing
pub trait PageTracker {
    /// Ensures a row exists for every page in `start..=end`
    fn materialize_page_range(&mut self, start: u32, end: u32) -> StorageResult<()>;

    /// Pages not yet fully harvested, ascending
    fn list_unscraped_pages(&self) -> StorageResult<Vec<u32>>;

    /// Flags a page as fully harvested
    ///
    /// Returns true only when this call moved the flag from false to true.
    fn mark_scraped(&mut self, page_number: u32) -> StorageResult<bool>;

    /// Clears the scraped flag for `start..=end`, returning how many changed
    fn reset_range(&mut self, start: u32, end: u32) -> StorageResult<usize>;

    fn get_page(&self, page_number: u32) -> StorageResult<Option<PageRecord>>;

    fn count_pages(&self) -> StorageResult<u64>;

    fn count_scraped_pages(&self) -> StorageResult<u64>;
}
