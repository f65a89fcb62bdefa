// src/pipeline/pool.rs

//! Bounded worker pool over discovered links.
//!
//! Each link is processed exactly once: a fresh cache record is served
//! offline, anything else goes through the [`EventAcquirer`] and its result
//! is written back to the cache before the worker finishes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};

use crate::error::{AcquisitionFailure, AppError, Result};
use crate::ics;
use crate::models::{CacheRecord, Event, EventLink, FetchResult, LinkOutcome};
use crate::services::{DiscoveredLinks, EventAcquirer};
use crate::storage::FreshnessCache;
use crate::utils::cancel::Cancellation;

pub struct WorkerPool {
    acquirer: EventAcquirer,
    cache: Arc<FreshnessCache>,
    cancel: Cancellation,
    max_concurrent: usize,
    grace_period: Duration,
}

impl WorkerPool {
    pub fn new(
        acquirer: EventAcquirer,
        cache: Arc<FreshnessCache>,
        cancel: Cancellation,
        max_concurrent: usize,
        grace_period: Duration,
    ) -> Self {
        Self {
            acquirer,
            cache,
            cancel,
            max_concurrent,
            grace_period,
        }
    }

    /// Number of workers actually used for `links` links.
    pub fn effective_concurrency(&self, links: usize) -> usize {
        self.max_concurrent.min(links).max(1)
    }

    /// Drive every link to a terminal outcome.
    ///
    /// Outcomes arrive in completion order. On cancellation, in-flight work
    /// gets the grace period to finish and the run is reported as aborted.
    pub async fn run(&self, links: &DiscoveredLinks) -> Result<Vec<(EventLink, LinkOutcome)>> {
        let concurrency = self.effective_concurrency(links.len());
        log::info!(
            "Processing {} links with {} workers",
            links.len(),
            concurrency
        );

        let stream = stream::iter(links.iter().cloned())
            .map(|link| async move {
                let outcome = self.process(&link).await;
                (link, outcome)
            })
            .buffer_unordered(concurrency);
        let mut stream = std::pin::pin!(stream);
        let mut outcomes = Vec::with_capacity(links.len());

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {}
            () = drain(&mut stream, &mut outcomes) => return Ok(outcomes),
        }

        log::warn!(
            "Run cancelled with {}/{} links done; waiting up to {:?} for in-flight work",
            outcomes.len(),
            links.len(),
            self.grace_period
        );
        if tokio::time::timeout(self.grace_period, drain(&mut stream, &mut outcomes))
            .await
            .is_err()
        {
            log::warn!("Grace period elapsed, abandoning in-flight requests");
        }

        Err(AppError::aborted(format!(
            "cancelled after {} of {} links",
            outcomes.len(),
            links.len()
        )))
    }

    async fn process(&self, link: &EventLink) -> LinkOutcome {
        let url = link.as_str();
        let previous = self.cache.get(url);

        if !self.cache.should_fetch(url) {
            return match previous.as_ref().and_then(rebuild_from_cache) {
                Some(event) => {
                    log::debug!("Cache hit: {}", link);
                    LinkOutcome::Cached(event)
                }
                None => {
                    log::debug!("Cache hit without a usable calendar: {}", link);
                    LinkOutcome::CachedWithoutBody
                }
            };
        }

        let previous_description = previous.as_ref().map(|r| r.description.as_str());
        match self.acquirer.acquire(link, previous_description).await {
            Ok(acquired) => {
                let changed = previous
                    .as_ref()
                    .and_then(|r| r.fingerprint.as_deref())
                    != Some(acquired.fingerprint.as_str());
                if changed {
                    log::info!("Added/updated: {}", acquired.event.summary);
                } else {
                    log::debug!("Unchanged: {}", acquired.event.summary);
                }

                self.cache
                    .record_result_at(
                        url,
                        FetchResult::Success {
                            fingerprint: acquired.fingerprint,
                            description: acquired.event.description.clone(),
                            calendar: acquired.blob.body,
                        },
                        acquired.event.fetched_at,
                    )
                    .await;

                LinkOutcome::Fetched {
                    event: acquired.event,
                    changed,
                }
            }
            Err(AcquisitionFailure::Cancelled) => {
                LinkOutcome::Failed(AcquisitionFailure::Cancelled)
            }
            Err(failure) => {
                log::warn!("Failed to fetch calendar for {}: {}", link, failure);
                self.cache.record_result(url, FetchResult::Miss).await;
                LinkOutcome::Failed(failure)
            }
        }
    }
}

/// Rebuild an event from a servable record, timestamped at its last success.
fn rebuild_from_cache(record: &CacheRecord) -> Option<Event> {
    if !record.is_servable() {
        return None;
    }
    let body = record.calendar.as_deref()?;
    let fetched_at = record.last_success.unwrap_or_else(Utc::now);
    let mut event = ics::parse_event(body, &record.url, fetched_at)?;
    event.description = record.description.clone();
    Some(event)
}

async fn drain<S>(stream: &mut S, outcomes: &mut Vec<S::Item>)
where
    S: Stream + Unpin,
{
    while let Some(item) = stream.next().await {
        outcomes.push(item);
    }
}
