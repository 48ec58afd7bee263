//! Content hash resolution
//!
//! A record's document URL embeds a hash that only the detail view exposes.
//! The view fills in its related links late, so a first read may come back
//! without one: the resolver then waits for the page to settle and reads it
//! once more before giving up.

use crate::browser::PageSession;
use crate::source::{parse_detail_page, SourceUrls};
use crate::{HarvestError, Result};
use std::time::Duration;

/// Looks up content hashes from detail pages
#[derive(Debug, Clone)]
pub struct HashResolver {
    urls: SourceUrls,
    settle_delay: Duration,
}

impl HashResolver {
    pub fn new(urls: SourceUrls, settle_delay: Duration) -> Self {
        Self { urls, settle_delay }
    }

    /// Resolves the content hash of a record
    ///
    /// # Arguments
    ///
    /// * `session` - The session used to open the detail view
    /// * `external_id` - The record's document identifier
    /// * `submitter_reference` - The reference token from the listing link
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The hash, from the first or the second reading
    /// * `Err(HarvestError::HashNotFound)` - Neither reading exposed a hash
    /// * `Err(HarvestError::TransientFetch)` - The detail view could not be opened
    pub async fn resolve<S: PageSession + ?Sized>(
        &self,
        session: &mut S,
        external_id: &str,
        submitter_reference: &str,
    ) -> Result<String> {
        if let Some(hash) = self.attempt(session, external_id, submitter_reference).await? {
            return Ok(hash);
        }

        tracing::debug!(
            "No hash for {} yet, re-reading in {:?}",
            external_id,
            self.settle_delay
        );
        tokio::time::sleep(self.settle_delay).await;

        match self.attempt(session, external_id, submitter_reference).await? {
            Some(hash) => Ok(hash),
            None => Err(HarvestError::HashNotFound {
                external_id: external_id.to_string(),
            }),
        }
    }

    async fn attempt<S: PageSession + ?Sized>(
        &self,
        session: &mut S,
        external_id: &str,
        submitter_reference: &str,
    ) -> Result<Option<String>> {
        let url = self.urls.detail_url(external_id, submitter_reference)?;
        let html = session.open(&url).await?;

        let Some(resource) = parse_detail_page(&html).resource else {
            return Ok(None);
        };

        if resource.external_id != external_id {
            tracing::warn!(
                "Detail page for {} links document {}; ignoring its hash",
                external_id,
                resource.external_id
            );
            return Ok(None);
        }

        Ok(Some(resource.hash))
    }
}
