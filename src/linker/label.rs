//! Supplementary label parsing

use regex::Regex;
use std::sync::OnceLock;

static SUPPLEMENTARY: OnceLock<Regex> = OnceLock::new();

fn supplementary_pattern() -> &'static Regex {
    SUPPLEMENTARY.get_or_init(|| Regex::new(r"^(.+?)\s+Supp (\d+)$").expect("valid pattern"))
}

/// A label of the form `<base> Supp <N>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplementaryLabel {
    /// The submitter the amendment belongs to
    pub base: String,
    /// N, the position among the base's amendments (1-based)
    pub order: u32,
}

/// Parses a submitter label as a supplementary amendment
///
/// Surrounding whitespace is ignored. Labels without a trailing ` Supp N`,
/// with `N` = 0, or with nothing before the marker are not supplementary.
///
/// # Example
///
/// ```
/// use submission_harvester::linker::parse_supplementary_label;
///
/// let label = parse_supplementary_label("Jane Doe Supp 2").unwrap();
/// assert_eq!(label.base, "Jane Doe");
/// assert_eq!(label.order, 2);
/// ```
pub fn parse_supplementary_label(label: &str) -> Option<SupplementaryLabel> {
    let caps = supplementary_pattern().captures(label.trim())?;
    let base = caps.get(1)?.as_str().trim();
    let order: u32 = caps.get(2)?.as_str().parse().ok()?;

    if base.is_empty() || order == 0 {
        return None;
    }

    Some(SupplementaryLabel {
        base: base.to_string(),
        order,
    })
}
