//! Detail page extraction

use crate::source::{last_two_segments, normalize_text, parse_listing_date};
use chrono::NaiveDate;
use regex::Regex;
use scraper::{Html, Selector};

/// Selectors for the document link, most specific first
const RESOURCE_SELECTORS: [&str; 2] = [
    r#"span.related-links__legacy-link a[href*="/resource/"]"#,
    r#".related-links__item a[href*="/resource/"]"#,
];

/// Identifier and hash taken from a detail page's document link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLink {
    pub external_id: String,
    pub hash: String,
}

/// Fields read from a submission's detail view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailPage {
    /// Label after the last " - " of the page title
    pub submitter: Option<String>,
    pub published: Option<NaiveDate>,
    /// Absent while the page has not finished rendering its related links
    pub resource: Option<ResourceLink>,
}

/// Parses a detail page
///
/// # Arguments
///
/// * `html` - The detail page markup
///
/// # Returns
///
/// The extracted fields; each is `None` when the page does not carry it.
pub fn parse_detail_page(html: &str) -> DetailPage {
    let document = Html::parse_document(html);

    DetailPage {
        submitter: extract_submitter(&document),
        published: extract_published(&document),
        resource: extract_resource(&document),
    }
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| normalize_text(&element.text().collect::<String>()))
}

fn extract_submitter(document: &Html) -> Option<String> {
    let title = first_text(document, "h1.beta")?;
    let (_, label) = title.rsplit_once(" - ")?;
    let label = label.trim();
    (!label.is_empty()).then(|| label.to_string())
}

fn extract_published(document: &Html) -> Option<NaiveDate> {
    let text = first_text(document, "span.publish-date")?;
    let pattern = Regex::new(r"(?i)Published date:?\s*(.+)").ok()?;
    let date = pattern.captures(&text)?.get(1)?.as_str().trim().to_string();
    parse_listing_date(&date)
}

fn extract_resource(document: &Html) -> Option<ResourceLink> {
    RESOURCE_SELECTORS.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        let href = document
            .select(&selector)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| !href.trim().is_empty())?;
        let (external_id, hash) = last_two_segments(href)?;
        Some(ResourceLink { external_id, hash })
    })
}
