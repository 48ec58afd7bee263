//! In-memory source site for crawler tests

use crate::browser::{DownloadOutcome, PageSession};
use crate::config::{
    Config, HarvesterConfig, OutputConfig, SessionConfig, SortDirection, SortOption, SourceConfig,
};
use crate::source::{last_two_segments, SourceUrls};
use crate::{HarvestError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use url::Url;

pub(crate) const BASE_URL: &str = "https://site.test";

pub(crate) fn source_config(base_url: &str) -> SourceConfig {
    SourceConfig {
        base_url: base_url.to_string(),
        keyword: "Test Bill".to_string(),
        sort: SortOption::PublicationDate,
        direction: SortDirection::Ascending,
    }
}

pub(crate) fn test_config(dir: &Path, concurrency: u32, page_size: usize) -> Config {
    Config {
        harvester: HarvesterConfig {
            concurrency,
            page_size,
            settle_delay_ms: 1,
            failure_cooldown_secs: 0,
        },
        source: source_config(BASE_URL),
        session: SessionConfig::default(),
        output: OutputConfig {
            database_path: dir.join("db.sqlite"),
            document_dir: dir.join("pdf"),
            backup_dir: None,
        },
    }
}

/// A listing row: identifier, submitter label, date text
pub(crate) type Entry<'a> = (&'a str, &'a str, &'a str);

pub(crate) fn slug(label: &str) -> String {
    label.to_lowercase().replace(' ', "-")
}

pub(crate) fn listing_html(entries: &[Entry<'_>], total_pages: u32) -> String {
    let rows: String = entries
        .iter()
        .map(|(id, label, date)| {
            format!(
                r#"<tr><td><div class="list__cell-body"><a href="/en/pb/sc/submissions-and-advice/document/{id}/{slug}" title="{label}">{label}</a></div></td><td>Justice Committee</td><td>{date}</td></tr>"#,
                id = id,
                slug = slug(label),
                label = label,
                date = date
            )
        })
        .collect();

    format!(
        r#"<html><body><table class="table--list"><tbody>{}</tbody></table><div class="pagination__item--mobile">Page 1 of {}</div></body></html>"#,
        rows, total_pages
    )
}

pub(crate) fn detail_html(external_id: &str, hash: &str) -> String {
    format!(
        r#"<html><body><h1 class="beta">Test Bill - Submitter</h1><span class="related-links__legacy-link"><a href="/resource/en-NZ/{}/{}">PDF</a></span></body></html>"#,
        external_id, hash
    )
}

pub(crate) fn detail_html_without_link() -> String {
    r#"<html><body><h1 class="beta">Test Bill - Submitter</h1></body></html>"#.to_string()
}

#[derive(Default)]
struct SiteState {
    /// Responses per URL; the last one repeats
    pages: HashMap<String, VecDeque<String>>,
    /// Remaining forced failures per URL
    failures: HashMap<String, usize>,
    rejections: HashMap<String, DownloadOutcome>,
    opened: Vec<String>,
    downloaded: Vec<String>,
}

/// A scripted source site shared by every session it hands out
#[derive(Clone)]
pub(crate) struct FakeSite {
    urls: SourceUrls,
    state: Arc<Mutex<SiteState>>,
}

impl FakeSite {
    pub(crate) fn new() -> Self {
        Self {
            urls: SourceUrls::new(&source_config(BASE_URL)).unwrap(),
            state: Arc::new(Mutex::new(SiteState::default())),
        }
    }

    pub(crate) fn session(&self) -> FakeSession {
        FakeSession { site: self.clone() }
    }

    fn set(&self, url: Url, responses: Vec<String>) {
        self.state
            .lock()
            .unwrap()
            .pages
            .insert(url.to_string(), responses.into());
    }

    pub(crate) fn set_listing(&self, page: u32, html: &str) {
        self.set(self.urls.listing_url(page).unwrap(), vec![html.to_string()]);
    }

    /// Serves a listing page and a resolvable detail page for every entry
    pub(crate) fn set_listing_with_details(&self, page: u32, entries: &[Entry<'_>], total: u32) {
        self.set_listing(page, &listing_html(entries, total));
        for (id, label, _) in entries {
            self.set_detail(id, &slug(label), &detail_html(id, &format!("hash-{}", id)));
        }
    }

    pub(crate) fn set_detail(&self, external_id: &str, reference: &str, html: &str) {
        self.set_detail_sequence(external_id, reference, vec![html.to_string()]);
    }

    pub(crate) fn set_detail_sequence(&self, external_id: &str, reference: &str, html: Vec<String>) {
        self.set(self.urls.detail_url(external_id, reference).unwrap(), html);
    }

    pub(crate) fn fail_listing(&self, page: u32, times: usize) {
        let url = self.urls.listing_url(page).unwrap().to_string();
        self.state.lock().unwrap().failures.insert(url, times);
    }

    pub(crate) fn reject_download(&self, external_id: &str, outcome: DownloadOutcome) {
        self.state
            .lock()
            .unwrap()
            .rejections
            .insert(external_id.to_string(), outcome);
    }

    pub(crate) fn clear_rejection(&self, external_id: &str) {
        self.state.lock().unwrap().rejections.remove(external_id);
    }

    pub(crate) fn open_count(&self) -> usize {
        self.state.lock().unwrap().opened.len()
    }

    pub(crate) fn listing_opens(&self, page: u32) -> usize {
        let url = self.urls.listing_url(page).unwrap().to_string();
        self.state
            .lock()
            .unwrap()
            .opened
            .iter()
            .filter(|opened| **opened == url)
            .count()
    }

    pub(crate) fn downloaded_urls(&self) -> Vec<String> {
        self.state.lock().unwrap().downloaded.clone()
    }
}

pub(crate) struct FakeSession {
    site: FakeSite,
}

#[async_trait]
impl PageSession for FakeSession {
    async fn open(&mut self, url: &Url) -> Result<String> {
        let mut state = self.site.state.lock().unwrap();
        let key = url.to_string();
        state.opened.push(key.clone());

        if let Some(remaining) = state.failures.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(HarvestError::TransientFetch {
                    url: key,
                    message: "scripted failure".to_string(),
                });
            }
        }

        let responses = state.pages.get_mut(&key).filter(|r| !r.is_empty());
        match responses {
            Some(responses) if responses.len() > 1 => Ok(responses.pop_front().unwrap()),
            Some(responses) => Ok(responses[0].clone()),
            None => Err(HarvestError::TransientFetch {
                url: key,
                message: "HTTP 404".to_string(),
            }),
        }
    }

    async fn download(&mut self, url: &Url, destination: &Path) -> Result<DownloadOutcome> {
        let rejection = {
            let mut state = self.site.state.lock().unwrap();
            state.downloaded.push(url.to_string());
            let (external_id, _) = last_two_segments(url.path()).unwrap();
            state.rejections.get(&external_id).cloned()
        };

        if let Some(outcome) = rejection {
            return Ok(outcome);
        }

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = b"%PDF-1.4 fake document";
        std::fs::write(destination, body)?;
        Ok(DownloadOutcome::Saved {
            bytes: body.len() as u64,
        })
    }
}
