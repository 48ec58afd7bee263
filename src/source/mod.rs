//! The submissions source site
//!
//! This module knows the shape of the one site the harvester reads:
//! - URL construction for the listing, detail and resource views
//! - Field extraction from listing pages
//! - Hash extraction from detail pages

mod detail;
mod listing;

pub use detail::{parse_detail_page, DetailPage, ResourceLink};
pub use listing::{parse_listing_date, parse_listing_page, ListingEntry, ListingPage};

use crate::config::{SortDirection, SortOption, SourceConfig};
use crate::Result;
use url::Url;

/// Path of the keyword-searchable submissions listing
const LISTING_PATH: &str = "/en/pb/sc/evidence-submissions/";

/// Path prefix of a submission's detail view
const DETAIL_PATH: &str = "/en/pb/sc/submissions-and-advice/document/";

/// Path prefix of a submission's document
const RESOURCE_PATH: &str = "/resource/en-NZ/";

/// Builds the URLs of the source site's views
#[derive(Debug, Clone)]
pub struct SourceUrls {
    base: Url,
    keyword: String,
    sort: SortOption,
    direction: SortDirection,
}

impl SourceUrls {
    /// Creates a URL builder from the source configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The source configuration
    ///
    /// # Returns
    ///
    /// * `Ok(SourceUrls)` - The base URL parsed
    /// * `Err(HarvestError)` - The base URL is invalid
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            base: Url::parse(&config.base_url)?,
            keyword: config.keyword.clone(),
            sort: config.sort,
            direction: config.direction,
        })
    }

    /// URL of one 1-indexed listing page
    ///
    /// The keyword is sent quoted so the search matches the whole phrase.
    pub fn listing_url(&self, page_number: u32) -> Result<Url> {
        let mut url = self.base.join(LISTING_PATH)?;
        let query = format!(
            "Criteria.PageNumber={}&Criteria.Keyword={}&Criteria.Sort={}&Criteria.Direction={}",
            page_number,
            urlencoding::encode(&format!("\"{}\"", self.keyword)),
            self.sort.as_query_value(),
            self.direction.as_query_value()
        );
        url.set_query(Some(&query));
        Ok(url)
    }

    /// URL of a submission's detail view
    pub fn detail_url(&self, external_id: &str, submitter_reference: &str) -> Result<Url> {
        let path = format!(
            "{}{}/{}",
            DETAIL_PATH,
            urlencoding::encode(external_id),
            urlencoding::encode(submitter_reference)
        );
        Ok(self.base.join(&path)?)
    }

    /// URL of a submission's document
    pub fn resource_url(&self, external_id: &str, hash: &str) -> Result<Url> {
        let path = format!(
            "{}{}/{}",
            RESOURCE_PATH,
            urlencoding::encode(external_id),
            urlencoding::encode(hash)
        );
        Ok(self.base.join(&path)?)
    }
}

/// Splits the last two path segments off a link
///
/// Listing links end in `<identifier>/<reference>` and resource links in
/// `<identifier>/<hash>`. Query strings and fragments are ignored.
pub(crate) fn last_two_segments(href: &str) -> Option<(String, String)> {
    let path = href.split(['?', '#']).next().unwrap_or("");
    let mut segments = path.trim_end_matches('/').rsplit('/');

    let last = segments.next()?.trim();
    let second = segments.next()?.trim();

    if last.is_empty() || second.is_empty() {
        return None;
    }

    Some((second.to_string(), last.to_string()))
}

/// Collapses whitespace, including non-breaking spaces, to single spaces
pub(crate) fn normalize_text(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
