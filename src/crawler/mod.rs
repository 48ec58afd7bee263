//! Crawler module for harvesting the submissions listing
//!
//! This module contains the core harvesting logic, including:
//! - Hash resolution from detail pages, with one settled re-attempt
//! - Document acquisition
//! - Page workers that process a contiguous chunk of listing pages
//! - Overall crawl coordination and resumption

mod acquirer;
mod coordinator;
mod hash_resolver;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use acquirer::{document_path, DocumentAcquirer};
pub use coordinator::{partition_backlog, Coordinator, CrawlReport, ResumeReport};
pub use hash_resolver::HashResolver;
pub use worker::{PageEvent, PageOutcome, PageWorker, WorkerPhase, WorkerReport};

use crate::browser::PageSession;
use crate::config::{Config, HarvesterConfig};
use crate::source::SourceUrls;
use crate::storage::{RecordStore, SharedStorage};
use crate::{HarvestError, Result};

/// Everything a worker needs besides its session
///
/// Built once per crawl and shared between workers behind an `Arc`.
pub struct HarvestContext {
    pub storage: SharedStorage,
    pub urls: SourceUrls,
    pub settings: HarvesterConfig,
    pub resolver: HashResolver,
    pub acquirer: DocumentAcquirer,
}

/// What happened to one record during a harvest attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The document was already stored by an earlier pass
    AlreadyDownloaded,
    /// The document was downloaded and the record flagged
    Acquired { bytes: u64 },
}

impl HarvestContext {
    pub fn new(storage: SharedStorage, config: &Config) -> Result<Self> {
        let urls = SourceUrls::new(&config.source)?;
        Ok(Self {
            storage,
            resolver: HashResolver::new(urls.clone(), config.harvester.settle_delay()),
            acquirer: DocumentAcquirer::new(urls.clone(), config.output.document_dir.clone()),
            urls,
            settings: config.harvester.clone(),
        })
    }

    /// Brings one known record to the downloaded state
    ///
    /// Resolves the hash when the record has none (which needs the submitter
    /// reference), downloads the document and flags the record. Each step
    /// commits on its own, so a failure leaves the completed steps in place.
    pub async fn harvest_record<S: PageSession + ?Sized>(
        &self,
        session: &mut S,
        external_id: &str,
        submitter_reference: Option<&str>,
    ) -> Result<RecordOutcome> {
        if self.storage.with(|s| s.is_downloaded(external_id))? {
            tracing::debug!("{} already downloaded", external_id);
            return Ok(RecordOutcome::AlreadyDownloaded);
        }

        let hash = self
            .ensure_hash(session, external_id, submitter_reference)
            .await?;
        let bytes = self
            .acquire_and_flag(session, external_id, &hash, || {})
            .await?;
        Ok(RecordOutcome::Acquired { bytes })
    }

    /// Returns the stored hash, resolving and storing it first if missing
    pub async fn ensure_hash<S: PageSession + ?Sized>(
        &self,
        session: &mut S,
        external_id: &str,
        submitter_reference: Option<&str>,
    ) -> Result<String> {
        if let Some(hash) = self.storage.with(|s| s.get_hash(external_id))? {
            return Ok(hash);
        }

        let reference = submitter_reference.ok_or_else(|| HarvestError::HashNotFound {
            external_id: external_id.to_string(),
        })?;
        let hash = self.resolver.resolve(session, external_id, reference).await?;
        self.storage.with(|s| s.set_hash(external_id, &hash))?;
        Ok(hash)
    }

    /// Downloads the document and flags the record once the file is in place
    ///
    /// `on_stored` runs between the download and the flag.
    pub async fn acquire_and_flag<S, F>(
        &self,
        session: &mut S,
        external_id: &str,
        hash: &str,
        on_stored: F,
    ) -> Result<u64>
    where
        S: PageSession + ?Sized,
        F: FnOnce(),
    {
        let bytes = self.acquirer.acquire(session, external_id, hash).await?;
        on_stored();
        self.storage.with(|s| s.flag_downloaded(external_id))?;

        tracing::info!("Downloaded {} ({} bytes)", external_id, bytes);
        Ok(bytes)
    }
}
