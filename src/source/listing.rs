//! Listing page extraction
//!
//! The listing renders the same entries twice: a desktop table and a mobile
//! accordion. The table is read when present, the accordion otherwise.

use crate::source::{last_two_segments, normalize_text};
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Date format of the listing's date column, e.g. `5 December 2024`
const LISTING_DATE_FORMAT: &str = "%d %B %Y";

/// One entry of a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub external_id: String,
    /// Token needed to open the entry's detail view
    pub submitter_reference: String,
    pub submitter: String,
    pub bill: String,
    pub committee: String,
    /// None when the date text could not be parsed
    pub submitted_at: Option<NaiveDate>,
}

/// Entries and pagination of one listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub entries: Vec<ListingEntry>,
    pub current_page: u32,
    pub total_pages: u32,
}

/// Fields read from a row before its link is split into identifiers
struct RawEntry {
    href: String,
    submitter: String,
    bill: String,
    committee: String,
    date: String,
}

/// Parses a listing page into its entries and pagination
///
/// Entries whose link does not end in `<identifier>/<reference>` are dropped
/// with a warning; such a page never counts as full.
///
/// # Arguments
///
/// * `html` - The listing page markup
///
/// # Returns
///
/// The extracted entries, the current page number and the total page count.
/// Pagination defaults to page 1 of 1 when it cannot be read.
pub fn parse_listing_page(html: &str) -> ListingPage {
    let document = Html::parse_document(html);

    let mut raw = extract_table_rows(&document);
    if raw.is_empty() {
        raw = extract_accordion_items(&document);
    }

    let entries = raw
        .into_iter()
        .filter_map(|entry| match last_two_segments(&entry.href) {
            Some((external_id, submitter_reference)) => Some(ListingEntry {
                external_id,
                submitter_reference,
                submitted_at: parse_listing_date(&entry.date),
                submitter: entry.submitter,
                bill: entry.bill,
                committee: entry.committee,
            }),
            None => {
                tracing::warn!(
                    "Skipping listing entry '{}' with unusable link '{}'",
                    entry.submitter,
                    entry.href
                );
                None
            }
        })
        .collect();

    ListingPage {
        entries,
        current_page: extract_current_page(&document).unwrap_or(1),
        total_pages: extract_total_pages(&document),
    }
}

/// Parses a listing date such as `5 December 2024`
///
/// Non-breaking spaces are normalized. Unparseable text yields `None`.
pub fn parse_listing_date(text: &str) -> Option<NaiveDate> {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(&normalized, LISTING_DATE_FORMAT).ok()
}

fn extract_table_rows(document: &Html) -> Vec<RawEntry> {
    let (Ok(row_selector), Ok(cell_selector)) = (
        Selector::parse("table.table--list tbody tr"),
        Selector::parse("td"),
    ) else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    for row in document.select(&row_selector) {
        let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
        if cells.len() < 3 {
            continue;
        }

        let name_cell = cells[0];
        let link = first_match(name_cell, "a");
        let submitter = link
            .and_then(|a| a.value().attr("title"))
            .map(normalize_text)
            .filter(|s| !s.is_empty())
            .or_else(|| first_text(name_cell, ".list__cell-body a"))
            .unwrap_or_default();

        rows.push(RawEntry {
            href: link
                .and_then(|a| a.value().attr("href"))
                .unwrap_or("")
                .to_string(),
            submitter,
            bill: first_text(name_cell, "p.list__cell-text").unwrap_or_default(),
            committee: element_text(cells[1]),
            date: element_text(cells[2]),
        });
    }

    rows
}

fn extract_accordion_items(document: &Html) -> Vec<RawEntry> {
    let Ok(item_selector) = Selector::parse(".accordion-details-list__item") else {
        return Vec::new();
    };

    document
        .select(&item_selector)
        .map(|item| {
            let title = first_match(item, ".accordion-details-list__title");
            let committee =
                first_text(item, ".accordion-details-list__body p:nth-child(2)").unwrap_or_default();
            let date =
                first_text(item, ".accordion-details-list__body p:nth-child(3)").unwrap_or_default();

            RawEntry {
                href: title
                    .and_then(|t| t.value().attr("href"))
                    .unwrap_or("")
                    .to_string(),
                submitter: title.map(element_text).unwrap_or_default(),
                bill: first_text(item, ".accordion-details-list__body div").unwrap_or_default(),
                committee: committee.replace("Committee:", "").trim().to_string(),
                date: date.replace("Date:", "").trim().to_string(),
            }
        })
        .collect()
}

fn extract_current_page(document: &Html) -> Option<u32> {
    let desktop = Selector::parse(".pagination__item--desktop span.is-selected").ok()?;
    if let Some(selected) = document.select(&desktop).next() {
        return element_text(selected).parse().ok();
    }

    let mobile = Selector::parse(".pagination__dropdown-trigger").ok()?;
    document
        .select(&mobile)
        .next()
        .and_then(|trigger| element_text(trigger).parse().ok())
}

fn extract_total_pages(document: &Html) -> u32 {
    if let (Ok(mobile), Ok(pattern)) = (
        Selector::parse(".pagination__item--mobile"),
        Regex::new(r"of\s+(\d+)"),
    ) {
        let text = document
            .select(&mobile)
            .next()
            .map(element_text)
            .unwrap_or_default();
        if let Some(total) = pattern
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
        {
            return total;
        }
    }

    let items = Selector::parse(".pagination__item--desktop a, .pagination__item--desktop span")
        .map(|links| document.select(&links).count())
        .unwrap_or(0);

    (items as u32).max(1)
}

fn first_match<'a>(element: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    element.select(&selector).next()
}

fn first_text(element: ElementRef<'_>, css: &str) -> Option<String> {
    first_match(element, css)
        .map(element_text)
        .filter(|s| !s.is_empty())
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_text(&element.text().collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_row(id: &str, name: &str, date: &str) -> String {
        format!(
            r#"<tr>
                <td>
                  <div class="list__cell-body">
                    <a href="/en/pb/sc/submissions-and-advice/document/{id}/{slug}" title="{name}">{name}</a>
                  </div>
                  <p class="list__cell-text">Principles of the Treaty of Waitangi Bill</p>
                </td>
                <td>Justice&nbsp;Committee</td>
                <td>{date}</td>
              </tr>"#,
            id = id,
            slug = name.to_lowercase().replace(' ', "-"),
            name = name,
            date = date
        )
    }

    fn table_page(rows: &[String], pagination: &str) -> String {
        format!(
            r#"<html><body>
               <table class="table--list"><tbody>{}</tbody></table>
               {}
               </body></html>"#,
            rows.join("\n"),
            pagination
        )
    }

    #[test]
    fn test_parse_table_layout() {
        let html = table_page(
            &[
                table_row("PAR_1", "Jane Doe", "5&nbsp;December&nbsp;2024"),
                table_row("PAR_2", "John Roe", "6 December 2024"),
            ],
            r#"<ul>
                 <li class="pagination__item--desktop"><span class="is-selected">2</span></li>
                 <li class="pagination__item--desktop"><a href="?p=3">3</a></li>
                 <li class="pagination__item--mobile">Page 2 of 120</li>
               </ul>"#,
        );

        let page = parse_listing_page(&html);

        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.current_page, 2);
        assert_eq!(page.total_pages, 120);

        let first = &page.entries[0];
        assert_eq!(first.external_id, "PAR_1");
        assert_eq!(first.submitter_reference, "jane-doe");
        assert_eq!(first.submitter, "Jane Doe");
        assert_eq!(first.committee, "Justice Committee");
        assert_eq!(first.bill, "Principles of the Treaty of Waitangi Bill");
        assert_eq!(first.submitted_at, NaiveDate::from_ymd_opt(2024, 12, 5));
    }

    #[test]
    fn test_parse_accordion_layout() {
        let html = r#"<html><body>
            <div class="accordion-details-list__item">
              <a class="accordion-details-list__title"
                 href="/en/pb/sc/submissions-and-advice/document/PAR_9/jane-doe-supp-1">Jane Doe Supp 1</a>
              <div class="accordion-details-list__body">
                <div>Principles of the Treaty of Waitangi Bill</div>
                <p>Committee: Justice Committee</p>
                <p>Date: 7&nbsp;January&nbsp;2025</p>
              </div>
            </div>
            <span class="pagination__dropdown-trigger"> 4 </span>
          </body></html>"#;

        let page = parse_listing_page(html);

        assert_eq!(page.entries.len(), 1);
        let entry = &page.entries[0];
        assert_eq!(entry.external_id, "PAR_9");
        assert_eq!(entry.submitter, "Jane Doe Supp 1");
        assert_eq!(entry.committee, "Justice Committee");
        assert_eq!(entry.submitted_at, NaiveDate::from_ymd_opt(2025, 1, 7));
        assert_eq!(page.current_page, 4);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_total_pages_from_desktop_items() {
        let html = table_page(
            &[table_row("PAR_1", "Jane Doe", "5 December 2024")],
            r#"<ul>
                 <li class="pagination__item--desktop"><span class="is-selected">1</span></li>
                 <li class="pagination__item--desktop"><a href="?p=2">2</a></li>
                 <li class="pagination__item--desktop"><a href="?p=3">3</a></li>
               </ul>"#,
        );

        let page = parse_listing_page(&html);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_empty_page() {
        let page = parse_listing_page("<html><body><p>No results</p></body></html>");
        assert!(page.entries.is_empty());
        assert_eq!(page.current_page, 1);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_unparseable_date_is_none() {
        let html = table_page(&[table_row("PAR_1", "Jane Doe", "sometime soon")], "");
        let page = parse_listing_page(&html);
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].submitted_at, None);
    }

    #[test]
    fn test_entry_without_link_is_skipped() {
        let html = r#"<html><body><table class="table--list"><tbody>
              <tr><td><span>Nobody</span></td><td>Committee</td><td>5 December 2024</td></tr>
            </tbody></table></body></html>"#;
        let page = parse_listing_page(html);
        assert!(page.entries.is_empty());
    }

    #[test]
    fn test_parse_listing_date() {
        assert_eq!(
            parse_listing_date("5\u{a0}December\u{a0}2024"),
            NaiveDate::from_ymd_opt(2024, 12, 5)
        );
        assert_eq!(
            parse_listing_date("17 March 2025"),
            NaiveDate::from_ymd_opt(2025, 3, 17)
        );
        assert_eq!(parse_listing_date(""), None);
        assert_eq!(parse_listing_date("2024-12-05"), None);
    }
}
