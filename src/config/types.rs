use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub harvester: HarvesterConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub session: SessionConfig,
    pub output: OutputConfig,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HarvesterConfig {
    /// Number of page workers (and browser sessions) running in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Number of entries on a full listing page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: usize,

    /// Wait before re-reading a detail page that rendered without a hash (milliseconds)
    #[serde(rename = "settle-delay-ms", default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Pause after a failed page before retrying the same page (seconds)
    #[serde(
        rename = "failure-cooldown-secs",
        default = "default_failure_cooldown_secs"
    )]
    pub failure_cooldown_secs: u64,
}

impl HarvesterConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_secs(self.failure_cooldown_secs)
    }
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            page_size: default_page_size(),
            settle_delay_ms: default_settle_delay_ms(),
            failure_cooldown_secs: default_failure_cooldown_secs(),
        }
    }
}

/// Which listing to harvest and how to order it
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Scheme and host of the source site
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Keyword the listing is searched for (quoted when sent)
    pub keyword: String,

    #[serde(default)]
    pub sort: SortOption,

    #[serde(default)]
    pub direction: SortDirection,
}

/// Sort criteria understood by the listing search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SortOption {
    #[default]
    PublicationDate,
}

impl SortOption {
    pub fn as_query_value(&self) -> &'static str {
        match self {
            Self::PublicationDate => "PublicationDate",
        }
    }
}

/// Sort direction of the listing
///
/// Ascending keeps already-harvested pages stable while new submissions are
/// appended to the tail page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_query_value(&self) -> &'static str {
        match self {
            Self::Ascending => "Ascending",
            Self::Descending => "Descending",
        }
    }
}

/// Navigation session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds; 0 waits indefinitely
    #[serde(rename = "request-timeout-secs", default)]
    pub request_timeout_secs: u64,
}

impl SessionConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: 0,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: PathBuf,

    /// Directory downloaded documents are written to
    #[serde(rename = "document-dir")]
    pub document_dir: PathBuf,

    /// Directory the database is copied into before each run
    #[serde(rename = "backup-dir", default)]
    pub backup_dir: Option<PathBuf>,
}

fn default_concurrency() -> u32 {
    4
}

fn default_page_size() -> usize {
    20
}

fn default_settle_delay_ms() -> u64 {
    5_000
}

fn default_failure_cooldown_secs() -> u64 {
    300
}

fn default_user_agent() -> String {
    format!("submission-harvester/{}", env!("CARGO_PKG_VERSION"))
}
