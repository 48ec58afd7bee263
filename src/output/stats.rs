//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::state::GroupClassification;
use crate::storage::{PageTracker, RecordStore, StorageResult};
use std::collections::HashMap;

/// Harvest statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestStatistics {
    /// Total number of records discovered
    pub total_records: u64,

    /// Records with a resolved content hash
    pub hashed: u64,

    /// Records whose document is stored
    pub downloaded: u64,

    /// Top-level records with extracted content
    pub parsed: u64,

    /// Supplementary links between records
    pub links: u64,

    /// Listing pages known to the tracker
    pub total_pages: u64,

    pub scraped_pages: u64,

    /// Top-level record counts by reviewer classification
    pub classification: HashMap<GroupClassification, u64>,
}

impl HarvestStatistics {
    /// Records that are not a supplementary child
    pub fn top_level(&self) -> u64 {
        self.classification.values().sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics<T>(storage: &T) -> StorageResult<HarvestStatistics>
where
    T: RecordStore + PageTracker + ?Sized,
{
    Ok(HarvestStatistics {
        total_records: storage.count_records()?,
        hashed: storage.count_hashed()?,
        downloaded: storage.count_downloaded()?,
        parsed: storage.count_parsed()?,
        links: storage.count_links()?,
        total_pages: storage.count_pages()?,
        scraped_pages: storage.count_scraped_pages()?,
        classification: storage.classification_breakdown()?,
    })
}

fn percentage(count: u64, total: u64) -> f64 {
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Pages:");
    println!(
        "  Scraped: {} / {} ({:.1}%)",
        stats.scraped_pages,
        stats.total_pages,
        percentage(stats.scraped_pages, stats.total_pages)
    );
    println!();

    println!("Records:");
    println!("  Total discovered: {}", stats.total_records);
    for (label, count) in [("Hashed", stats.hashed), ("Downloaded", stats.downloaded)] {
        println!(
            "  {}: {} ({:.1}%)",
            label,
            count,
            percentage(count, stats.total_records)
        );
    }
    println!("  Supplementary links: {}", stats.links);
    println!();

    let top_level = stats.top_level();
    println!("Top-level submissions: {}", top_level);
    println!(
        "  Parsed: {} ({:.1}%)",
        stats.parsed,
        percentage(stats.parsed, top_level)
    );
    for classification in GroupClassification::all() {
        let count = stats.classification.get(&classification).copied().unwrap_or(0);
        println!(
            "  {}: {} ({:.1}%)",
            classification,
            count,
            percentage(count, top_level)
        );
    }
}
