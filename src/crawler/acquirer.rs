//! Document acquisition

use crate::browser::{DownloadOutcome, PageSession};
use crate::source::SourceUrls;
use crate::{HarvestError, Result};
use std::path::{Path, PathBuf};

/// Where the document of `external_id` is stored
pub fn document_path(document_dir: &Path, external_id: &str) -> PathBuf {
    document_dir.join(format!("{}.pdf", external_id))
}

/// Downloads documents into the document directory
#[derive(Debug, Clone)]
pub struct DocumentAcquirer {
    urls: SourceUrls,
    document_dir: PathBuf,
}

impl DocumentAcquirer {
    pub fn new(urls: SourceUrls, document_dir: PathBuf) -> Self {
        Self { urls, document_dir }
    }

    pub fn document_dir(&self) -> &Path {
        &self.document_dir
    }

    /// Downloads a record's document
    ///
    /// The file is complete on disk before this returns `Ok`, so the caller
    /// may flag the record downloaded right after.
    ///
    /// # Returns
    ///
    /// * `Ok(u64)` - Bytes written
    /// * `Err(HarvestError::DownloadFailed)` - The server refused, or sent a page instead of a document
    /// * `Err(HarvestError::TransientFetch)` - Network failure
    pub async fn acquire<S: PageSession + ?Sized>(
        &self,
        session: &mut S,
        external_id: &str,
        hash: &str,
    ) -> Result<u64> {
        let url = self.urls.resource_url(external_id, hash)?;
        let destination = document_path(&self.document_dir, external_id);

        tracing::debug!("Fetching {} into {}", url, destination.display());

        match session.download(&url, &destination).await? {
            DownloadOutcome::Saved { bytes } => Ok(bytes),
            DownloadOutcome::NotADocument { content_type } => Err(HarvestError::DownloadFailed {
                external_id: external_id.to_string(),
                reason: format!("expected a document, got {}", content_type),
            }),
            DownloadOutcome::Rejected { status_code } => Err(HarvestError::DownloadFailed {
                external_id: external_id.to_string(),
                reason: format!("HTTP {}", status_code),
            }),
        }
    }
}
