//! Poppler command-line tools

use crate::content::{ContentParser, ExtractionError};
use crate::storage::ParsedContent;
use std::path::Path;
use std::process::Command;

/// Lines `pdfimages -list` prints before the first image row
const IMAGE_LIST_HEADER_LINES: usize = 2;

/// Parses PDFs with `pdftotext` and `pdfimages`
#[derive(Debug, Clone)]
pub struct PopplerParser {
    pdftotext: String,
    pdfimages: String,
}

impl Default for PopplerParser {
    fn default() -> Self {
        Self {
            pdftotext: "pdftotext".to_string(),
            pdfimages: "pdfimages".to_string(),
        }
    }
}

impl PopplerParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses tool binaries other than the ones on `PATH`
    pub fn with_tools(pdftotext: &str, pdfimages: &str) -> Self {
        Self {
            pdftotext: pdftotext.to_string(),
            pdfimages: pdfimages.to_string(),
        }
    }

    fn extract_text(&self, path: &Path) -> Result<String, ExtractionError> {
        let result = Command::new(&self.pdftotext).arg(path).arg("-").output();
        handle_cmd_output(result, &self.pdftotext, "pdftotext failed")
    }

    fn count_images(&self, path: &Path) -> Result<u64, ExtractionError> {
        let result = Command::new(&self.pdfimages).arg("-list").arg(path).output();
        let listing = handle_cmd_output(result, &self.pdfimages, "pdfimages failed")?;
        Ok(count_listed_images(&listing))
    }
}

impl ContentParser for PopplerParser {
    fn parse(&self, path: &Path) -> Result<ParsedContent, ExtractionError> {
        let size = std::fs::metadata(path)?.len();
        Ok(ParsedContent {
            text: self.extract_text(path)?,
            size,
            image_count: self.count_images(path)?,
        })
    }
}

/// Stdout on success, otherwise an error naming the tool
fn handle_cmd_output(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
    error_prefix: &str,
) -> Result<String, ExtractionError> {
    match result {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(output) => Err(ExtractionError::ExtractionFailed(format!(
            "{}: {}",
            error_prefix,
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExtractionError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(ExtractionError::Io(e)),
    }
}

fn count_listed_images(listing: &str) -> u64 {
    listing
        .lines()
        .skip(IMAGE_LIST_HEADER_LINES)
        .filter(|line| !line.trim().is_empty())
        .count() as u64
}
