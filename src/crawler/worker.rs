//! Page workers
//!
//! A worker owns one navigation session and a contiguous chunk of listing
//! pages. Pages are processed strictly in order: a page is fully handled,
//! including every download it triggers, before the next one is claimed. A
//! failing page is retried after the failure cooldown until it succeeds, so a
//! worker never skips ahead.

use crate::browser::{PageSession, PooledSession};
use crate::crawler::HarvestContext;
use crate::source::{parse_listing_page, ListingEntry};
use crate::storage::{PageTracker, RecordStore, StorageError};
use crate::Result;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Where a worker is in its page loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    ClaimNextPage,
    ExtractRecords,
    ReconcileIdentity,
    ResolveHash,
    Acquire,
    FlagDownloaded,
    MaybeFlagPageScraped,
    /// Chunk exhausted
    Idle,
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ClaimNextPage => "claim-next-page",
            Self::ExtractRecords => "extract-records",
            Self::ReconcileIdentity => "reconcile-identity",
            Self::ResolveHash => "resolve-hash",
            Self::Acquire => "acquire",
            Self::FlagDownloaded => "flag-downloaded",
            Self::MaybeFlagPageScraped => "maybe-flag-page-scraped",
            Self::Idle => "idle",
        };
        write!(f, "{}", name)
    }
}

/// Result of one successful pass over a listing page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutcome {
    pub page_number: u32,
    /// Entries on the page
    pub entries: usize,
    /// Records that were new to the store
    pub discovered: usize,
    /// Documents downloaded during this pass
    pub acquired: usize,
    /// Whether the page was full and is now flagged scraped
    pub scraped: bool,
}

/// Progress notifications streamed to the coordinator
#[derive(Debug, Clone)]
pub enum PageEvent {
    Completed { worker_id: usize, outcome: PageOutcome },
    Failed {
        worker_id: usize,
        page_number: u32,
        attempt: u32,
        error: String,
    },
}

/// Totals for one worker's chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub pages_scraped: usize,
    /// Pages processed but not full, left in the backlog
    pub partial_pages: usize,
    pub records_discovered: usize,
    pub documents_acquired: usize,
    /// Failed page attempts, each followed by a cooldown and a retry
    pub failures: usize,
}

/// Processes one chunk of listing pages with one session
pub struct PageWorker<S: PageSession> {
    id: usize,
    pages: VecDeque<u32>,
    session: PooledSession<S>,
    context: Arc<HarvestContext>,
    events: UnboundedSender<PageEvent>,
    phase: WorkerPhase,
}

impl<S: PageSession + 'static> PageWorker<S> {
    pub fn new(
        id: usize,
        pages: Vec<u32>,
        session: PooledSession<S>,
        context: Arc<HarvestContext>,
        events: UnboundedSender<PageEvent>,
    ) -> Self {
        Self {
            id,
            pages: pages.into(),
            session,
            context,
            events,
            phase: WorkerPhase::ClaimNextPage,
        }
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    /// Works through the chunk and returns the totals
    ///
    /// Only returns once every page of the chunk has been processed
    /// successfully. The session goes back to the pool when the worker drops.
    pub async fn run(mut self) -> WorkerReport {
        let mut report = WorkerReport {
            worker_id: self.id,
            ..WorkerReport::default()
        };

        tracing::info!("Worker {} starting with {} pages", self.id, self.pages.len());

        loop {
            self.enter(WorkerPhase::ClaimNextPage);
            let Some(page_number) = self.pages.pop_front() else {
                break;
            };

            let mut attempt = 0;
            let outcome = loop {
                attempt += 1;
                match self.process_page(page_number).await {
                    Ok(outcome) => break outcome,
                    Err(e) => {
                        report.failures += 1;
                        tracing::error!(
                            "Worker {} failed page {} (attempt {}): {}",
                            self.id,
                            page_number,
                            attempt,
                            e
                        );
                        let _ = self.events.send(PageEvent::Failed {
                            worker_id: self.id,
                            page_number,
                            attempt,
                            error: e.to_string(),
                        });

                        let cooldown = self.context.settings.failure_cooldown();
                        tracing::info!(
                            "Worker {} retrying page {} in {:?}",
                            self.id,
                            page_number,
                            cooldown
                        );
                        tokio::time::sleep(cooldown).await;
                    }
                }
            };

            if outcome.scraped {
                report.pages_scraped += 1;
            } else {
                report.partial_pages += 1;
            }
            report.records_discovered += outcome.discovered;
            report.documents_acquired += outcome.acquired;

            let _ = self.events.send(PageEvent::Completed {
                worker_id: self.id,
                outcome,
            });
        }

        self.enter(WorkerPhase::Idle);
        tracing::info!(
            "Worker {} idle: {} scraped, {} partial, {} documents",
            self.id,
            report.pages_scraped,
            report.partial_pages,
            report.documents_acquired
        );

        report
    }

    /// One attempt at a listing page
    ///
    /// Any error aborts the attempt; records handled before the error keep
    /// their committed progress.
    pub async fn process_page(&mut self, page_number: u32) -> Result<PageOutcome> {
        self.enter(WorkerPhase::ExtractRecords);
        let url = self.context.urls.listing_url(page_number)?;
        let html = self.session.open(&url).await?;
        let listing = parse_listing_page(&html);

        tracing::info!(
            "Worker {} page {}: {} entries",
            self.id,
            page_number,
            listing.entries.len()
        );

        let mut outcome = PageOutcome {
            page_number,
            entries: listing.entries.len(),
            discovered: 0,
            acquired: 0,
            scraped: false,
        };

        for entry in &listing.entries {
            if self.reconcile(entry)? {
                outcome.discovered += 1;
            }

            if self.context.storage.with(|s| s.is_downloaded(&entry.external_id))? {
                continue;
            }

            self.enter(WorkerPhase::ResolveHash);
            let hash = self
                .context
                .ensure_hash(
                    &mut *self.session,
                    &entry.external_id,
                    Some(&entry.submitter_reference),
                )
                .await?;

            self.enter(WorkerPhase::Acquire);
            let (id, phase) = (self.id, &mut self.phase);
            self.context
                .acquire_and_flag(&mut *self.session, &entry.external_id, &hash, || {
                    transition(id, phase, WorkerPhase::FlagDownloaded)
                })
                .await?;
            tracing::debug!("Worker {} stored {}", self.id, entry.external_id);
            outcome.acquired += 1;
        }

        self.enter(WorkerPhase::MaybeFlagPageScraped);
        if listing.entries.len() == self.context.settings.page_size {
            self.context
                .storage
                .with(|s| s.mark_scraped(page_number))?;
            outcome.scraped = true;
        } else {
            tracing::info!(
                "Page {} has {} of {} entries; leaving it unscraped",
                page_number,
                listing.entries.len(),
                self.context.settings.page_size
            );
        }

        Ok(outcome)
    }

    /// Ensures the record exists and refreshes what the listing says about it
    ///
    /// Returns whether the record was created by this call.
    fn reconcile(&mut self, entry: &ListingEntry) -> Result<bool> {
        self.enter(WorkerPhase::ReconcileIdentity);

        let (_, created) = self.context.storage.with(|s| {
            let ensured =
                s.ensure_record(&entry.external_id, &entry.submitter, entry.submitted_at)?;
            s.refresh_submitted_at(&entry.external_id, entry.submitted_at)?;
            s.set_submitter_reference(&entry.external_id, &entry.submitter_reference)?;
            Ok::<_, StorageError>(ensured)
        })?;

        if created {
            tracing::debug!("New record {} ({})", entry.external_id, entry.submitter);
        }

        Ok(created)
    }

    fn enter(&mut self, phase: WorkerPhase) {
        transition(self.id, &mut self.phase, phase);
    }
}

fn transition(worker_id: usize, current: &mut WorkerPhase, next: WorkerPhase) {
    if *current != next {
        tracing::debug!("Worker {}: {} -> {}", worker_id, current, next);
        *current = next;
    }
}
