//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the harvester database.

/// Current schema version, recorded in `schema_meta`
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per harvested listing entry
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    submitter TEXT NOT NULL,
    submitted_at TEXT,
    submitter_reference TEXT,
    content_hash TEXT,
    downloaded INTEGER NOT NULL DEFAULT 0,
    is_group INTEGER,
    discovered_at TEXT NOT NULL,
    CHECK (downloaded = 0 OR content_hash IS NOT NULL)
);

CREATE INDEX IF NOT EXISTS idx_records_submitter ON records(submitter, submitted_at);
CREATE INDEX IF NOT EXISTS idx_records_downloaded ON records(downloaded);

-- Supplementary amendments attached to their parent submission
CREATE TABLE IF NOT EXISTS record_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id INTEGER NOT NULL REFERENCES records(id),
    child_id INTEGER NOT NULL UNIQUE REFERENCES records(id),
    link_order INTEGER NOT NULL CHECK (link_order > 0),
    created_at TEXT NOT NULL,
    CHECK (parent_id <> child_id)
);

CREATE INDEX IF NOT EXISTS idx_record_links_parent ON record_links(parent_id);

-- Harvest progress of each listing page
CREATE TABLE IF NOT EXISTS page_records (
    page_number INTEGER PRIMARY KEY,
    scraped INTEGER NOT NULL DEFAULT 0
);

-- Extracted document content, combined across a record and its children
CREATE TABLE IF NOT EXISTS document_contents (
    record_id INTEGER PRIMARY KEY REFERENCES records(id),
    content TEXT NOT NULL,
    size INTEGER NOT NULL,
    image_count INTEGER NOT NULL,
    parsed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL
);
"#;

/// Initializes the database schema and records its version
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT INTO schema_meta (id, version, applied_at) VALUES (1, ?1, ?2)
         ON CONFLICT(id) DO UPDATE SET version = excluded.version
         WHERE schema_meta.version < excluded.version",
        rusqlite::params![SCHEMA_VERSION, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Reads the schema version recorded in the database
pub fn get_schema_version(conn: &rusqlite::Connection) -> Result<u32, rusqlite::Error> {
    conn.query_row("SELECT version FROM schema_meta WHERE id = 1", [], |row| {
        row.get(0)
    })
}
