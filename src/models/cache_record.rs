//! Persistent per-URL cache metadata.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// What the freshness cache remembers about one event URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub url: String,

    /// SHA-256 hex of the normalized calendar bytes from the last success
    #[serde(default)]
    pub fingerprint: Option<String>,

    #[serde(default)]
    pub description: String,

    pub last_checked: DateTime<Utc>,

    #[serde(default)]
    pub last_success: Option<DateTime<Utc>>,

    /// Last successfully parsed calendar body
    #[serde(default)]
    pub calendar: Option<String>,
}

impl CacheRecord {
    pub fn new(url: impl Into<String>, checked_at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            fingerprint: None,
            description: String::new(),
            last_checked: checked_at,
            last_success: None,
            calendar: None,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_checked < ttl
    }

    /// True when the most recent check succeeded and a body is available.
    pub fn is_servable(&self) -> bool {
        self.calendar.is_some()
            && self
                .last_success
                .is_some_and(|success| success >= self.last_checked)
    }
}

/// Outcome of one acquisition attempt, as recorded in the cache.
#[derive(Debug, Clone)]
pub enum FetchResult {
    Success {
        fingerprint: String,
        description: String,
        calendar: String,
    },
    /// Every variant failed; only `last_checked` moves
    Miss,
}
