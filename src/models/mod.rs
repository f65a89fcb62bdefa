// src/models/mod.rs

//! Domain models for the aggregator.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod cache_record;
mod config;
mod event;
mod run;

// Re-export all public types
pub use cache_record::{CacheRecord, FetchResult};
pub use config::{
    AcquireConfig, CacheConfig, CalendarUrlVariant, Config, CrawlerConfig, DiscoveryConfig,
    LinkStrategy, OutputConfig, SourceConfig, parse_selector,
};
pub use event::{
    CustomProperty, Event, EventLink, EventTime, RawCalendarBlob, TimezoneDefinition,
    synthesize_uid,
};
pub use run::{LinkOutcome, RunReport, RunStats, RunStatus};
