//! Output module for operator-facing reports
//!
//! This module handles:
//! - Loading and printing harvest statistics
//! - Listing top-level records that still await review

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};

use crate::linker::link_supplementary;
use crate::storage::{Record, RecordStore};
use crate::Result;

/// Formats a record as one line of a review listing
///
/// # Example
///
/// ```
/// use submission_harvester::output::format_record_line;
/// use submission_harvester::storage::Record;
/// use submission_harvester::GroupClassification;
///
/// let record = Record {
///     id: 7,
///     external_id: "PAR_123".to_string(),
///     submitter: "Jane Doe".to_string(),
///     submitted_at: chrono::NaiveDate::from_ymd_opt(2024, 12, 5),
///     submitter_reference: None,
///     content_hash: None,
///     downloaded: false,
///     classification: GroupClassification::Unknown,
///     discovered_at: String::new(),
///     parsed: false,
/// };
/// assert_eq!(format_record_line(&record), "PAR_123  2024-12-05  Jane Doe");
/// ```
pub fn format_record_line(record: &Record) -> String {
    let date = record
        .submitted_at
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "----------".to_string());
    format!("{}  {}  {}", record.external_id, date, record.submitter)
}

/// Links supplementary records, then lists top-level records awaiting review
///
/// Linking first keeps amendments out of the review list; they are
/// classified through their parent.
pub fn load_unclassified<T: RecordStore + ?Sized>(store: &mut T) -> Result<Vec<Record>> {
    let links = link_supplementary(store)?;
    if links.links_created > 0 {
        tracing::info!("Linked {} supplementary records", links.links_created);
    }
    Ok(store.list_top_level_unclassified()?)
}

/// Prints the records awaiting classification, one per line
pub fn print_unclassified(records: &[Record]) {
    println!("=== Unclassified Submissions ({}) ===\n", records.len());
    for record in records {
        println!("  {}", format_record_line(record));
    }
}
