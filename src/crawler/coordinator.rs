//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl entry point that coordinates all aspects of
//! a harvest, including:
//! - Opening storage and building the session pool
//! - Retrying acquisition for records an interrupted run left behind
//! - Discovering the total page count from page 1
//! - Partitioning the unscraped backlog across a fixed pool of workers
//! - Collecting progress and the final report

use crate::browser::{build_http_client, HttpSession, PageSession, SessionPool};
use crate::config::Config;
use crate::crawler::worker::{PageEvent, PageWorker, WorkerReport};
use crate::crawler::{HarvestContext, RecordOutcome};
use crate::source::parse_listing_page;
use crate::storage::{open_storage, PageTracker, RecordStore, SharedStorage};
use crate::{HarvestError, Result};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Outcome of the pass over records left undownloaded by an earlier run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeReport {
    pub pending: usize,
    pub acquired: usize,
    /// Records with neither hash nor reference; the crawl will revisit them
    pub skipped: usize,
    pub failed: usize,
}

/// Summary of a crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub resumed: ResumeReport,
    pub total_pages: u32,
    /// Unscraped pages when the workers started
    pub backlog: usize,
    pub workers: usize,
    pub pages_scraped: usize,
    pub partial_pages: usize,
    pub records_discovered: usize,
    pub documents_acquired: usize,
    pub failures: usize,
    /// Unscraped pages after the workers finished
    pub remaining_backlog: usize,
}

impl CrawlReport {
    fn absorb(&mut self, worker: &WorkerReport) {
        self.pages_scraped += worker.pages_scraped;
        self.partial_pages += worker.partial_pages;
        self.records_discovered += worker.records_discovered;
        self.documents_acquired += worker.documents_acquired;
        self.failures += worker.failures;
    }
}

impl fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Resumed: {} pending, {} acquired, {} skipped, {} failed",
            self.resumed.pending, self.resumed.acquired, self.resumed.skipped, self.resumed.failed
        )?;
        writeln!(
            f,
            "Pages: {} total, {} in backlog, {} workers",
            self.total_pages, self.backlog, self.workers
        )?;
        writeln!(
            f,
            "Scraped: {} full, {} partial, {} new records, {} documents",
            self.pages_scraped, self.partial_pages, self.records_discovered, self.documents_acquired
        )?;
        write!(
            f,
            "Failures: {} (retried); remaining backlog: {}",
            self.failures, self.remaining_backlog
        )
    }
}

/// Splits the backlog into at most `concurrency` contiguous chunks
///
/// Every chunk holds `ceil(len / concurrency)` pages except possibly the last.
///
/// # Example
///
/// ```
/// use submission_harvester::crawler::partition_backlog;
///
/// let chunks = partition_backlog(&[1, 2, 3, 4, 5], 2);
/// assert_eq!(chunks, vec![vec![1, 2, 3], vec![4, 5]]);
/// ```
pub fn partition_backlog(backlog: &[u32], concurrency: usize) -> Vec<Vec<u32>> {
    if backlog.is_empty() {
        return Vec::new();
    }

    let workers = concurrency.max(1);
    let chunk_size = (backlog.len() + workers - 1) / workers;
    backlog.chunks(chunk_size).map(|c| c.to_vec()).collect()
}

/// Main crawl coordinator structure
pub struct Coordinator<S: PageSession + 'static> {
    context: Arc<HarvestContext>,
    pool: SessionPool<S>,
}

impl Coordinator<HttpSession> {
    /// Creates a coordinator that talks to the configured source over HTTP
    ///
    /// # Arguments
    ///
    /// * `config` - The harvester configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Storage opened and HTTP client built
    /// * `Err(HarvestError)` - Failed to initialize
    pub fn new(config: &Config) -> Result<Self> {
        let storage = SharedStorage::new(open_storage(&config.output.database_path)?);
        let client = build_http_client(&config.session)?;
        let pool = SessionPool::new(move || Ok(HttpSession::new(client.clone())));
        Self::with_pool(storage, config, pool)
    }
}

impl<S: PageSession + 'static> Coordinator<S> {
    /// Creates a coordinator over an already opened store and session pool
    pub fn with_pool(storage: SharedStorage, config: &Config, pool: SessionPool<S>) -> Result<Self> {
        Ok(Self {
            context: Arc::new(HarvestContext::new(storage, config)?),
            pool,
        })
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.context.storage
    }

    /// Runs the whole crawl
    ///
    /// 1. Retry acquisition for records left undownloaded
    /// 2. Read page 1 to learn the total page count
    /// 3. Materialize pages 1..=total and read the unscraped backlog
    /// 4. Partition the backlog and spawn one worker per chunk
    /// 5. Stream progress until every worker is idle
    pub async fn run(&self) -> Result<CrawlReport> {
        let mut report = CrawlReport {
            resumed: self.resume_pending().await?,
            ..CrawlReport::default()
        };

        report.total_pages = self.discover_total_pages().await?;
        if report.total_pages == 0 {
            tracing::info!("Listing page 1 is empty; nothing to harvest");
            return Ok(report);
        }

        let total_pages = report.total_pages;
        self.context
            .storage
            .with(|s| s.materialize_page_range(1, total_pages))?;

        let backlog = self.context.storage.with(|s| s.list_unscraped_pages())?;
        report.backlog = backlog.len();
        if backlog.is_empty() {
            tracing::info!("All {} pages already scraped", total_pages);
            return Ok(report);
        }

        let chunks = partition_backlog(&backlog, self.context.settings.concurrency as usize);
        report.workers = chunks.len();
        tracing::info!(
            "{} of {} pages to harvest across {} workers",
            backlog.len(),
            total_pages,
            chunks.len()
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();

        for (id, chunk) in chunks.into_iter().enumerate() {
            tracing::debug!("Worker {} takes pages {:?}", id, chunk);
            let session = self.pool.acquire()?;
            let worker = PageWorker::new(id, chunk, session, Arc::clone(&self.context), tx.clone());
            workers.spawn(worker.run());
        }
        drop(tx);

        let mut pages_done = 0;
        while let Some(event) = rx.recv().await {
            match event {
                PageEvent::Completed { worker_id, outcome } => {
                    pages_done += 1;
                    tracing::info!(
                        "Progress: {}/{} pages (worker {} finished page {}, {} documents)",
                        pages_done,
                        report.backlog,
                        worker_id,
                        outcome.page_number,
                        outcome.acquired
                    );
                }
                PageEvent::Failed {
                    worker_id,
                    page_number,
                    attempt,
                    error,
                } => {
                    tracing::warn!(
                        "Worker {} page {} attempt {} failed: {}",
                        worker_id,
                        page_number,
                        attempt,
                        error
                    );
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            let worker_report = joined?;
            report.absorb(&worker_report);
        }

        report.remaining_backlog = self
            .context
            .storage
            .with(|s| s.list_unscraped_pages())?
            .len();

        tracing::info!(
            "Crawl complete: {} pages scraped, {} partial, {} documents acquired, {} failures, {} pages remaining",
            report.pages_scraped,
            report.partial_pages,
            report.documents_acquired,
            report.failures,
            report.remaining_backlog
        );

        Ok(report)
    }

    /// Retries hash resolution and acquisition for undownloaded records
    ///
    /// Per-record failures are logged and left for the next run; storage
    /// failures abort the pass.
    pub async fn resume_pending(&self) -> Result<ResumeReport> {
        let pending = self.context.storage.with(|s| s.list_undownloaded())?;
        let mut report = ResumeReport {
            pending: pending.len(),
            ..ResumeReport::default()
        };

        if pending.is_empty() {
            return Ok(report);
        }

        tracing::info!("Resuming {} undownloaded records", pending.len());
        let mut session = self.pool.acquire()?;

        for record in pending {
            if record.content_hash.is_none() && record.submitter_reference.is_none() {
                tracing::debug!("{} has no reference yet; leaving it to the crawl", record.external_id);
                report.skipped += 1;
                continue;
            }

            tracing::debug!("Resuming {} ({})", record.external_id, record.state());
            let result = self
                .context
                .harvest_record(
                    &mut *session,
                    &record.external_id,
                    record.submitter_reference.as_deref(),
                )
                .await;

            match result {
                Ok(RecordOutcome::Acquired { .. }) => report.acquired += 1,
                Ok(RecordOutcome::AlreadyDownloaded) => {}
                Err(HarvestError::Storage(e)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!("Could not resume {}: {}", record.external_id, e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Resume pass: {} acquired, {} skipped, {} failed",
            report.acquired,
            report.skipped,
            report.failed
        );

        Ok(report)
    }

    /// Reads page 1 and returns the listing's total page count
    ///
    /// Returns 0 when page 1 has no entries. Failures are retried after the
    /// failure cooldown, like any worker page.
    pub async fn discover_total_pages(&self) -> Result<u32> {
        let mut session = self.pool.acquire()?;
        let url = self.context.urls.listing_url(1)?;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match session.open(&url).await {
                Ok(html) => {
                    let listing = parse_listing_page(&html);
                    if listing.entries.is_empty() {
                        return Ok(0);
                    }
                    tracing::info!("Listing has {} pages", listing.total_pages);
                    return Ok(listing.total_pages.max(1));
                }
                Err(e) => {
                    let cooldown = self.context.settings.failure_cooldown();
                    tracing::error!(
                        "Failed to read listing page 1 (attempt {}): {}; retrying in {:?}",
                        attempt,
                        e,
                        cooldown
                    );
                    tokio::time::sleep(cooldown).await;
                }
            }
        }
    }
}
