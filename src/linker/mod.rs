//! Supplementary record linking
//!
//! Submitters sometimes send amendments that the listing publishes as
//! separate entries labelled `<submitter> Supp <N>`. Amendments can appear on
//! a page harvested before or after the original, so linking runs as a
//! separate pass over the store once the crawl has converged.

mod label;

pub use label::{parse_supplementary_label, SupplementaryLabel};

use crate::storage::RecordStore;
use crate::{HarvestError, Result};
use std::collections::HashMap;

/// Outcome of a linking pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    /// Top-level records whose label parsed as supplementary
    pub candidates: usize,
    pub links_created: usize,
    pub already_linked: usize,
}

/// Attaches every unlinked supplementary record to its parent
///
/// Candidates are processed in ascending id. The parent of a base name is
/// looked up once per pass, using the submission date of the first
/// amendment seen for it, and reused for that base's later amendments.
///
/// # Arguments
///
/// * `store` - The record store to link in
///
/// # Returns
///
/// * `Ok(LinkReport)` - Every candidate was linked or already linked
/// * `Err(HarvestError::ParentNotFound)` - An amendment has no resolvable parent;
///   links created before it are kept
pub fn link_supplementary<T: RecordStore + ?Sized>(store: &mut T) -> Result<LinkReport> {
    let candidates = store.list_supplementary_candidates()?;
    let mut report = LinkReport::default();
    let mut parents: HashMap<String, i64> = HashMap::new();

    tracing::info!("Found {} possible supplementary records", candidates.len());

    for record in candidates {
        let Some(label) = parse_supplementary_label(&record.submitter) else {
            tracing::debug!("'{}' is not a supplementary label", record.submitter);
            continue;
        };
        report.candidates += 1;

        let parent_id = match parents.get(&label.base) {
            Some(id) => *id,
            None => {
                let not_found = || HarvestError::ParentNotFound {
                    label: record.submitter.clone(),
                };
                let submitted_at = record.submitted_at.ok_or_else(not_found)?;
                let id = store
                    .find_parent(&label.base, submitted_at)?
                    .ok_or_else(not_found)?;
                parents.insert(label.base.clone(), id);
                id
            }
        };

        if store.insert_link(parent_id, record.id, label.order)? {
            tracing::info!(
                "Linked '{}' to parent {} as #{}",
                record.submitter,
                parent_id,
                label.order
            );
            report.links_created += 1;
        } else {
            report.already_linked += 1;
        }
    }

    Ok(report)
}
