//! Submission Harvester: a resumable harvester for paginated public submissions
//!
//! This crate walks a paginated listing of public submissions, downloads the
//! document behind each entry and records enough state in SQLite to resume an
//! interrupted run without repeating completed work. Supplementary amendments
//! ("Jane Doe Supp 2") are linked to their parent submission after the crawl.

pub mod browser;
pub mod config;
pub mod content;
pub mod crawler;
pub mod linker;
pub mod output;
pub mod source;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Navigation or network failure; retried after the failure cooldown
    #[error("Transient fetch error for {url}: {message}")]
    TransientFetch { url: String, message: String },

    /// The detail page never exposed a document hash, even after settling
    #[error("Document hash not found for {external_id}")]
    HashNotFound { external_id: String },

    /// A supplementary record has no resolvable parent
    #[error("Parent submission not found for {label}")]
    ParentNotFound { label: String },

    #[error("Download failed for {external_id}: {reason}")]
    DownloadFailed { external_id: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Content extraction error: {0}")]
    Extraction(#[from] content::ExtractionError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Session pool error: {0}")]
    Session(String),

    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Returns true for errors that a later attempt may clear on its own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientFetch { .. } | Self::DownloadFailed { .. } | Self::Reqwest(_)
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{GroupClassification, RecordState};
pub use storage::{PageTracker, RecordStore, SharedStorage, SqliteStorage};
