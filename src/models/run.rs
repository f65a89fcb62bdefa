//! Per-run outcomes and statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AcquisitionFailure;
use crate::models::{Event, EventLink};

/// Terminal outcome for one discovered link.
#[derive(Debug, Clone)]
pub enum LinkOutcome {
    /// Fetched this run
    Fetched { event: Event, changed: bool },
    /// Rebuilt from a fresh cache record without network traffic
    Cached(Event),
    /// Fresh cache record with nothing servable; skipped until its TTL lapses
    CachedWithoutBody,
    /// Acquisition failed for this run
    Failed(AcquisitionFailure),
}

impl LinkOutcome {
    pub fn into_event(self) -> Option<Event> {
        match self {
            Self::Fetched { event, .. } | Self::Cached(event) => Some(event),
            _ => None,
        }
    }
}

/// Whether every link contributed, or some failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    /// At least one link failed; the artifact was still published
    PartialSuccess,
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub links_discovered: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub fetch_failures: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub collisions: usize,
    pub merged_events: usize,
    pub cache_degraded: bool,
}

impl RunStats {
    /// Tally pool outcomes.
    pub fn record_outcomes(&mut self, outcomes: &[(EventLink, LinkOutcome)]) {
        for (_, outcome) in outcomes {
            match outcome {
                LinkOutcome::Fetched { changed, .. } => {
                    self.cache_misses += 1;
                    if *changed {
                        self.changed += 1;
                    } else {
                        self.unchanged += 1;
                    }
                }
                LinkOutcome::Cached(_) | LinkOutcome::CachedWithoutBody => self.cache_hits += 1,
                LinkOutcome::Failed(_) => {
                    self.cache_misses += 1;
                    self.fetch_failures += 1;
                }
            }
        }
    }

    pub fn status(&self) -> RunStatus {
        if self.fetch_failures > 0 {
            RunStatus::PartialSuccess
        } else {
            RunStatus::Success
        }
    }
}

/// What a completed run reports to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: RunStats,
    pub status: RunStatus,
}
