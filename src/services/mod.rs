//! Service layer for the aggregator.
//!
//! This module contains the business logic for:
//! - Listing page link discovery (`LinkDiscoverer`)
//! - Per-event calendar acquisition (`EventAcquirer`)
//! - Description scraping (`DescriptionExtractor`)
//! - Global request spacing (`RateLimiter`)

mod acquirer;
mod description;
mod discovery;
mod rate_limiter;

pub use acquirer::{Acquired, EventAcquirer};
pub use description::DescriptionExtractor;
pub use discovery::{DiscoveredLinks, LinkDiscoverer};
pub use rate_limiter::RateLimiter;
