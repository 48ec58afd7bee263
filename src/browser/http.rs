//! HTTP session implementation
//!
//! This module implements [`PageSession`] on top of `reqwest`, including:
//! - Building HTTP clients with the configured user agent and timeout
//! - GET requests for listing and detail pages
//! - Document downloads written through a temporary `.part` file
//! - Error classification

use crate::browser::{DownloadOutcome, PageSession};
use crate::config::SessionConfig;
use crate::{HarvestError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The session configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use submission_harvester::browser::build_http_client;
/// use submission_harvester::config::SessionConfig;
///
/// let client = build_http_client(&SessionConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &SessionConfig) -> std::result::Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_secs(30))
        .gzip(true)
        .brotli(true);

    if let Some(timeout) = config.request_timeout() {
        builder = builder.timeout(timeout);
    }

    builder.build()
}

/// A navigation session backed by a `reqwest` client
///
/// Cloning a `reqwest::Client` shares its connection pool, so sessions built
/// from the same client are cheap.
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: Client,
}

impl HttpSession {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response> {
        self.client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transient(url, classify_error(&e)))
    }
}

#[async_trait]
impl PageSession for HttpSession {
    async fn open(&mut self, url: &Url) -> Result<String> {
        let response = self.get(url).await?;
        let status = response.status();

        if !status.is_success() {
            return Err(transient(url, format!("HTTP {}", status.as_u16())));
        }

        response
            .text()
            .await
            .map_err(|e| transient(url, classify_error(&e)))
    }

    async fn download(&mut self, url: &Url, destination: &Path) -> Result<DownloadOutcome> {
        let response = self.get(url).await?;
        let status = response.status();

        if !status.is_success() {
            return Ok(DownloadOutcome::Rejected {
                status_code: status.as_u16(),
            });
        }

        // Check Content-Type
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.contains("text/html") {
            return Ok(DownloadOutcome::NotADocument { content_type });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transient(url, classify_error(&e)))?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let partial = partial_path(destination);
        tokio::fs::write(&partial, &body).await?;
        tokio::fs::rename(&partial, destination).await?;

        Ok(DownloadOutcome::Saved {
            bytes: body.len() as u64,
        })
    }
}

fn transient(url: &Url, message: String) -> HarvestError {
    HarvestError::TransientFetch {
        url: url.to_string(),
        message,
    }
}

fn classify_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        "Connection refused".to_string()
    } else {
        error.to_string()
    }
}

/// `<destination>.part`, the file a download is streamed into
fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> HttpSession {
        HttpSession::new(build_http_client(&SessionConfig::default()).unwrap())
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&SessionConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_http_client_with_timeout() {
        let config = SessionConfig {
            user_agent: "TestHarvester/1.0".to_string(),
            request_timeout_secs: 10,
        };
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_partial_path() {
        let path = partial_path(Path::new("/tmp/pdf/DOC1.pdf"));
        assert_eq!(path, PathBuf::from("/tmp/pdf/DOC1.pdf.part"));
    }

    #[tokio::test]
    async fn test_open_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/listing"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/listing", server.uri())).unwrap();
        let body = session().open(&url).await.unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_open_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/listing", server.uri())).unwrap();
        let err = session().open(&url).await.unwrap_err();
        assert!(matches!(err, HarvestError::TransientFetch { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_download_saves_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/resource/en-NZ/DOC1/abc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.4 test".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("pdf").join("DOC1.pdf");
        let url = Url::parse(&format!("{}/resource/en-NZ/DOC1/abc", server.uri())).unwrap();

        let outcome = session().download(&url, &destination).await.unwrap();

        assert_eq!(outcome, DownloadOutcome::Saved { bytes: 13 });
        assert_eq!(std::fs::read(&destination).unwrap(), b"%PDF-1.4 test");
        assert!(!partial_path(&destination).exists());
    }

    #[tokio::test]
    async fn test_download_html_is_not_a_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html>error</html>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("DOC1.pdf");
        let url = Url::parse(&format!("{}/resource/en-NZ/DOC1/abc", server.uri())).unwrap();

        let outcome = session().download(&url, &destination).await.unwrap();

        assert!(matches!(outcome, DownloadOutcome::NotADocument { .. }));
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_download_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse(&format!("{}/resource/en-NZ/DOC1/abc", server.uri())).unwrap();

        let outcome = session()
            .download(&url, &dir.path().join("DOC1.pdf"))
            .await
            .unwrap();
        assert_eq!(outcome, DownloadOutcome::Rejected { status_code: 404 });
    }
}
