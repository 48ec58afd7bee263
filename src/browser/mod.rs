//! Navigation sessions
//!
//! A [`PageSession`] is the harvester's only way to reach the source site: it
//! opens listing and detail pages and downloads documents. Sessions are
//! exclusive, so each page worker borrows one from the [`SessionPool`] for the
//! duration of its chunk.

mod http;
mod pool;

pub use http::{build_http_client, HttpSession};
pub use pool::{PooledSession, SessionPool};

use crate::Result;
use async_trait::async_trait;
use std::path::Path;
use url::Url;

/// Result of a document download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The document was written to the requested path
    Saved {
        /// Number of bytes written
        bytes: u64,
    },

    /// The server answered with a page instead of a document
    NotADocument {
        /// The Content-Type received
        content_type: String,
    },

    /// The server refused the request
    Rejected {
        /// The HTTP status code
        status_code: u16,
    },
}

/// An exclusive navigation session against the source site
#[async_trait]
pub trait PageSession: Send {
    /// Navigates to `url` and returns the rendered markup
    ///
    /// Network failures and non-success statuses surface as
    /// `HarvestError::TransientFetch`.
    async fn open(&mut self, url: &Url) -> Result<String>;

    /// Downloads the resource at `url` into `destination`
    ///
    /// The file only appears at `destination` once it is complete.
    async fn download(&mut self, url: &Url, destination: &Path) -> Result<DownloadOutcome>;
}
