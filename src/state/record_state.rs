//! Lifecycle states of a harvested record
//!
//! The state is never stored directly; it is derived from the record's hash,
//! download flag and content row so that it cannot drift from the data.

use std::fmt;

/// Where a record sits between discovery and parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordState {
    /// Seen on a listing page; no content hash yet
    Discovered,

    /// Content hash resolved from the detail page; document not yet stored
    HashResolved,

    /// Document durably written to the document directory
    Downloaded,

    /// Document text, size and image count extracted
    Parsed,
}

impl RecordState {
    /// Derives the state from the stored record fields
    ///
    /// A downloaded record without a hash cannot exist (the store refuses to
    /// flag it), so `downloaded` is only consulted once a hash is present.
    pub fn derive(has_hash: bool, downloaded: bool, parsed: bool) -> Self {
        match (has_hash, downloaded, parsed) {
            (false, _, _) => Self::Discovered,
            (true, false, _) => Self::HashResolved,
            (true, true, false) => Self::Downloaded,
            (true, true, true) => Self::Parsed,
        }
    }

    /// Returns true once the document no longer needs to be fetched
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Downloaded | Self::Parsed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::HashResolved => "hash_resolved",
            Self::Downloaded => "downloaded",
            Self::Parsed => "parsed",
        }
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
