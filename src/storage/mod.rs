//! Persistence for the aggregator.
//!
//! ## Files
//!
//! ```text
//! data/calendar_cache.json     # Freshness cache, one record per event URL
//! public/merged_calendar.ics   # Published calendar artifact
//! ```
//!
//! Both are written with the same temp-file-then-rename discipline from
//! [`local`].

pub mod cache;
pub mod local;

// Re-export for convenience
pub use cache::{CacheSummary, FreshnessCache};
pub use local::{StagedWrite, write_atomic};
