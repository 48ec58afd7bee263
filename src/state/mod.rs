//! State module for tracking record progress
//!
//! # Components
//!
//! - `RecordState`: where a harvested record sits in its lifecycle
//!   (discovered, hash resolved, downloaded, parsed)
//! - `GroupClassification`: the reviewer's verdict on whether a submission
//!   came from an individual or an organised group

mod classification;
mod record_state;

// Re-export main types
pub use classification::GroupClassification;
pub use record_state::RecordState;
