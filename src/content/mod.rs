//! Document content extraction
//!
//! The content pass runs after linking. Each downloaded top-level record is
//! parsed together with its supplementary children, and the combined text,
//! byte size and image count are stored on the parent.

mod pdftools;

pub use pdftools::PopplerParser;

use crate::crawler::document_path;
use crate::linker::{link_supplementary, LinkReport};
use crate::storage::{ParsedContent, RecordStore};
use crate::Result;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during content extraction
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads text, size and image count out of a stored document
pub trait ContentParser {
    fn parse(&self, path: &Path) -> std::result::Result<ParsedContent, ExtractionError>;
}

/// Options for [`parse_documents`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Stop after this many records have been parsed
    pub limit: Option<usize>,
    /// Discard all stored content before parsing
    pub reset: bool,
}

/// Outcome of a content pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub cleared: usize,
    pub links: LinkReport,
    /// Records awaiting content when the pass started
    pub unparsed: usize,
    pub parsed: usize,
    /// Records skipped because a document file is missing
    pub missing: usize,
}

/// Links supplementary records, then parses every unparsed document
///
/// # Arguments
///
/// * `store` - The record store
/// * `parser` - The document parser
/// * `document_dir` - Directory the documents were downloaded into
/// * `options` - Limit and reset options
///
/// # Returns
///
/// * `Ok(ParseReport)` - The pass completed (possibly stopping at the limit)
/// * `Err(HarvestError)` - Linking, parsing or storage failed
pub fn parse_documents<T, P>(
    store: &mut T,
    parser: &P,
    document_dir: &Path,
    options: ParseOptions,
) -> Result<ParseReport>
where
    T: RecordStore + ?Sized,
    P: ContentParser + ?Sized,
{
    let mut report = ParseReport::default();

    if options.reset {
        report.cleared = store.clear_all_content()?;
        tracing::info!("Cleared content of {} records", report.cleared);
    }

    report.links = link_supplementary(store)?;

    let unparsed = store.list_unparsed()?;
    report.unparsed = unparsed.len();
    tracing::info!("Found {} unparsed records", unparsed.len());

    for record in unparsed {
        if options.limit.is_some_and(|limit| report.parsed >= limit) {
            tracing::info!("Reached parse limit of {}", report.parsed);
            break;
        }

        let children = store.list_children(record.id)?;
        if !children.is_empty() {
            tracing::debug!("{} has {} children", record.external_id, children.len());
        }

        let paths: Vec<_> = std::iter::once(&record)
            .chain(children.iter())
            .map(|r| document_path(document_dir, &r.external_id))
            .collect();

        if let Some(missing) = paths.iter().find(|p| !p.exists()) {
            tracing::warn!(
                "Skipping {}: missing document {}",
                record.external_id,
                missing.display()
            );
            report.missing += 1;
            continue;
        }

        let mut texts = Vec::with_capacity(paths.len());
        let mut content = ParsedContent::default();
        for path in &paths {
            let parsed = parser.parse(path)?;
            texts.push(parsed.text);
            content.size += parsed.size;
            content.image_count += parsed.image_count;
        }
        content.text = clean_text(&texts.join("\n\n"));

        store.set_content(record.id, &content)?;
        report.parsed += 1;
        tracing::info!(
            "Parsed {} ({} bytes, {} images)",
            record.external_id,
            content.size,
            content.image_count
        );
    }

    Ok(report)
}

/// Text with no letters at all (scans, blank pages) is stored as empty
fn clean_text(text: &str) -> String {
    if text.chars().any(|c| c.is_ascii_alphabetic()) {
        text.to_string()
    } else {
        String::new()
    }
}
