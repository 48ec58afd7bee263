//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the `RecordStore`
//! and `PageTracker` traits.

use crate::state::GroupClassification;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{PageTracker, RecordStore, StorageError, StorageResult};
use crate::storage::{PageRecord, ParsedContent, Record, RecordLink};
use crate::HarvestError;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// Columns selected for every `Record` query, in `record_from_row` order
const RECORD_COLUMNS: &str = "r.id, r.external_id, r.submitter, r.submitted_at,
     r.submitter_reference, r.content_hash, r.downloaded, r.is_group, r.discovered_at,
     EXISTS(SELECT 1 FROM document_contents c WHERE c.record_id = r.id)";

/// Restricts a query on `records r` to records that are nobody's child
const TOP_LEVEL_JOIN: &str = "LEFT JOIN record_links l ON l.child_id = r.id";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_records<P: rusqlite::Params>(&self, sql: &str, params: P) -> StorageResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let records = stmt
            .query_map(params, record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn parse_date(value: Option<String>) -> Option<NaiveDate> {
    value.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok())
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        external_id: row.get(1)?,
        submitter: row.get(2)?,
        submitted_at: parse_date(row.get(3)?),
        submitter_reference: row.get(4)?,
        content_hash: row.get(5)?,
        downloaded: row.get(6)?,
        classification: GroupClassification::from_db_value(row.get(7)?),
        discovered_at: row.get(8)?,
        parsed: row.get(9)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl RecordStore for SqliteStorage {
    // ===== Identity =====

    fn exists(&self, external_id: &str) -> StorageResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM records WHERE external_id = ?1)",
            params![external_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn create(
        &mut self,
        external_id: &str,
        submitter: &str,
        submitted_at: Option<NaiveDate>,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let result = self.conn.execute(
            "INSERT INTO records (external_id, submitter, submitted_at, discovered_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![external_id, submitter, format_date(submitted_at), now],
        );

        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(e) if is_constraint_violation(&e) => {
                Err(StorageError::DuplicateRecord(external_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_record_id(&self, external_id: &str) -> StorageResult<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM records WHERE external_id = ?1",
                params![external_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn get_record(&self, external_id: &str) -> StorageResult<Option<Record>> {
        let sql = format!(
            "SELECT {} FROM records r WHERE r.external_id = ?1",
            RECORD_COLUMNS
        );
        let record = self
            .conn
            .query_row(&sql, params![external_id], record_from_row)
            .optional()?;
        Ok(record)
    }

    fn refresh_submitted_at(
        &mut self,
        external_id: &str,
        submitted_at: Option<NaiveDate>,
    ) -> StorageResult<()> {
        // A missing record is not an error: the caller may refresh before create.
        self.conn.execute(
            "UPDATE records SET submitted_at = ?1 WHERE external_id = ?2",
            params![format_date(submitted_at), external_id],
        )?;
        Ok(())
    }

    fn set_submitter_reference(
        &mut self,
        external_id: &str,
        reference: &str,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE records SET submitter_reference = ?1 WHERE external_id = ?2",
            params![reference, external_id],
        )?;
        Ok(())
    }

    // ===== Hash and download =====

    fn get_hash(&self, external_id: &str) -> StorageResult<Option<String>> {
        let hash: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT content_hash FROM records WHERE external_id = ?1",
                params![external_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash.flatten())
    }

    fn set_hash(&mut self, external_id: &str, hash: &str) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE records SET content_hash = ?1 WHERE external_id = ?2",
            params![hash, external_id],
        )?;

        if changed == 0 {
            return Err(StorageError::RecordNotFound(external_id.to_string()));
        }
        Ok(())
    }

    fn is_downloaded(&self, external_id: &str) -> StorageResult<bool> {
        let downloaded: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM records WHERE external_id = ?1 AND downloaded = 1)",
            params![external_id],
            |row| row.get(0),
        )?;
        Ok(downloaded)
    }

    fn flag_downloaded(&mut self, external_id: &str) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE records SET downloaded = 1
             WHERE external_id = ?1 AND content_hash IS NOT NULL",
            params![external_id],
        )?;

        if changed == 0 {
            if self.exists(external_id)? {
                return Err(StorageError::HashMissing(external_id.to_string()));
            }
            return Err(StorageError::RecordNotFound(external_id.to_string()));
        }
        Ok(())
    }

    fn list_undownloaded(&self) -> StorageResult<Vec<Record>> {
        let sql = format!(
            "SELECT {} FROM records r WHERE r.downloaded = 0 ORDER BY r.id",
            RECORD_COLUMNS
        );
        self.query_records(&sql, [])
    }

    // ===== Top-level records and links =====

    fn list_top_level(&self) -> StorageResult<Vec<Record>> {
        let sql = format!(
            "SELECT {} FROM records r {} WHERE l.id IS NULL ORDER BY r.id",
            RECORD_COLUMNS, TOP_LEVEL_JOIN
        );
        self.query_records(&sql, [])
    }

    fn list_top_level_unclassified(&self) -> StorageResult<Vec<Record>> {
        let sql = format!(
            "SELECT {} FROM records r {} WHERE l.id IS NULL AND r.is_group IS NULL ORDER BY r.id",
            RECORD_COLUMNS, TOP_LEVEL_JOIN
        );
        self.query_records(&sql, [])
    }

    fn list_children(&self, parent_id: i64) -> StorageResult<Vec<Record>> {
        let sql = format!(
            "SELECT {} FROM records r
             INNER JOIN record_links l ON l.child_id = r.id
             WHERE l.parent_id = ?1
             ORDER BY l.link_order ASC, r.id ASC",
            RECORD_COLUMNS
        );
        self.query_records(&sql, params![parent_id])
    }

    fn set_group_classification(
        &mut self,
        external_id: &str,
        classification: GroupClassification,
    ) -> StorageResult<()> {
        let id = self
            .get_record_id(external_id)?
            .ok_or_else(|| StorageError::RecordNotFound(external_id.to_string()))?;

        if self.get_parent_link(id)?.is_some() {
            return Err(StorageError::LinkedChild(external_id.to_string()));
        }

        self.conn.execute(
            "UPDATE records SET is_group = ?1 WHERE id = ?2",
            params![classification.to_db_value(), id],
        )?;
        Ok(())
    }

    fn list_supplementary_candidates(&self) -> StorageResult<Vec<Record>> {
        let sql = format!(
            "SELECT {} FROM records r {}
             WHERE l.id IS NULL AND r.submitter LIKE '%Supp %'
             ORDER BY r.id",
            RECORD_COLUMNS, TOP_LEVEL_JOIN
        );
        self.query_records(&sql, [])
    }

    fn find_parent(
        &self,
        submitter: &str,
        submitted_at: NaiveDate,
    ) -> StorageResult<Option<i64>> {
        // ISO dates order lexicographically, so the newest date not after the
        // supplementary one sorts first and an exact match wins.
        let id = self
            .conn
            .query_row(
                "SELECT r.id FROM records r
                 LEFT JOIN record_links l ON l.child_id = r.id
                 WHERE l.id IS NULL
                   AND r.submitter = ?1
                   AND r.submitted_at IS NOT NULL
                   AND r.submitted_at <= ?2
                 ORDER BY r.submitted_at DESC, r.id ASC
                 LIMIT 1",
                params![submitter, format_date(Some(submitted_at))],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn insert_link(&mut self, parent_id: i64, child_id: i64, order: u32) -> StorageResult<bool> {
        if parent_id == child_id {
            return Err(StorageError::Database(format!(
                "record {} cannot be linked to itself",
                child_id
            )));
        }
        if order == 0 {
            return Err(StorageError::Database(format!(
                "link order for record {} must be positive",
                child_id
            )));
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO record_links (parent_id, child_id, link_order, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![parent_id, child_id, order, now],
        )?;
        // Children take their parent's classification
        if inserted > 0 {
            tx.execute(
                "UPDATE records SET is_group = NULL WHERE id = ?1",
                params![child_id],
            )?;
        }
        tx.commit()?;
        Ok(inserted > 0)
    }

    fn get_parent_link(&self, child_id: i64) -> StorageResult<Option<RecordLink>> {
        let link = self
            .conn
            .query_row(
                "SELECT parent_id, child_id, link_order FROM record_links WHERE child_id = ?1",
                params![child_id],
                |row| {
                    Ok(RecordLink {
                        parent_id: row.get(0)?,
                        child_id: row.get(1)?,
                        order: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(link)
    }

    // ===== Content =====

    fn list_unparsed(&self) -> StorageResult<Vec<Record>> {
        let sql = format!(
            "SELECT {} FROM records r {}
             LEFT JOIN document_contents dc ON dc.record_id = r.id
             WHERE r.downloaded = 1 AND l.id IS NULL AND dc.record_id IS NULL
             ORDER BY r.id",
            RECORD_COLUMNS, TOP_LEVEL_JOIN
        );
        self.query_records(&sql, [])
    }

    fn set_content(&mut self, record_id: i64, content: &ParsedContent) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO document_contents (record_id, content, size, image_count, parsed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(record_id) DO UPDATE SET
                content = excluded.content,
                size = excluded.size,
                image_count = excluded.image_count,
                parsed_at = excluded.parsed_at",
            params![
                record_id,
                content.text,
                content.size as i64,
                content.image_count as i64,
                now
            ],
        )?;
        Ok(())
    }

    fn clear_all_content(&mut self) -> StorageResult<usize> {
        let removed = self.conn.execute("DELETE FROM document_contents", [])?;
        Ok(removed)
    }

    // ===== Statistics =====

    fn count_records(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM records")
    }

    fn count_hashed(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM records WHERE content_hash IS NOT NULL")
    }

    fn count_downloaded(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM records WHERE downloaded = 1")
    }

    fn count_parsed(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM document_contents")
    }

    fn count_links(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM record_links")
    }

    fn classification_breakdown(&self) -> StorageResult<HashMap<GroupClassification, u64>> {
        let sql = format!(
            "SELECT r.is_group, COUNT(*) FROM records r {}
             WHERE l.id IS NULL
             GROUP BY r.is_group",
            TOP_LEVEL_JOIN
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, Option<i64>>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut breakdown = HashMap::new();
        for row in rows {
            let (value, count) = row?;
            *breakdown
                .entry(GroupClassification::from_db_value(value))
                .or_insert(0) += count as u64;
        }

        Ok(breakdown)
    }
}

impl PageTracker for SqliteStorage {
    fn materialize_page_range(&mut self, start: u32, end: u32) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO page_records (page_number, scraped) VALUES (?1, 0)",
            )?;
            for page in start..=end {
                stmt.execute(params![page])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn list_unscraped_pages(&self) -> StorageResult<Vec<u32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT page_number FROM page_records WHERE scraped = 0 ORDER BY page_number")?;
        let pages = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<u32>, _>>()?;
        Ok(pages)
    }

    fn mark_scraped(&mut self, page_number: u32) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE page_records SET scraped = 1 WHERE page_number = ?1 AND scraped = 0",
            params![page_number],
        )?;
        Ok(changed > 0)
    }

    fn reset_range(&mut self, start: u32, end: u32) -> StorageResult<usize> {
        let changed = self.conn.execute(
            "UPDATE page_records SET scraped = 0
             WHERE page_number BETWEEN ?1 AND ?2 AND scraped = 1",
            params![start, end],
        )?;
        Ok(changed)
    }

    fn get_page(&self, page_number: u32) -> StorageResult<Option<PageRecord>> {
        let page = self
            .conn
            .query_row(
                "SELECT page_number, scraped FROM page_records WHERE page_number = ?1",
                params![page_number],
                |row| {
                    Ok(PageRecord {
                        page_number: row.get(0)?,
                        scraped: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(page)
    }

    fn count_pages(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM page_records")
    }

    fn count_scraped_pages(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM page_records WHERE scraped = 1")
    }
}
