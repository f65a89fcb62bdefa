// src/pipeline/run.rs

use std::sync::Arc;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{Config, RunReport, RunStats};
use crate::services::{EventAcquirer, LinkDiscoverer, RateLimiter};
use crate::storage::FreshnessCache;
use crate::utils::cancel::Cancellation;
use crate::utils::http::Fetcher;

use super::merge::{merge, publish};
use super::pool::WorkerPool;

const TOTAL_STEPS: usize = 4;

/// Run one full aggregation: discover, acquire, merge, publish.
///
/// The run deadline from `config.crawler.run_timeout_secs` is armed on
/// `cancel`, so callers may also cancel it early. A cancelled run publishes
/// nothing.
pub async fn run_pipeline(
    config: &Config,
    fetcher: Arc<dyn Fetcher>,
    cancel: Cancellation,
) -> Result<RunReport> {
    let deadline = cancel.cancel_after(config.crawler.run_timeout());
    let result = run_stages(config, fetcher, &cancel).await;
    deadline.abort();
    result
}

async fn run_stages(
    config: &Config,
    fetcher: Arc<dyn Fetcher>,
    cancel: &Cancellation,
) -> Result<RunReport> {
    let started_at = Utc::now();
    let mut stats = RunStats::default();
    crate::utils::log::header("ICS aggregation");

    // Step 1: discovery
    crate::utils::log::step(1, TOTAL_STEPS, "Discover - Reading listing page");
    let limiter = Arc::new(RateLimiter::new(config.crawler.request_delay()));
    let discoverer = LinkDiscoverer::new(&config.discovery.strategies)?;
    let links = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(AppError::aborted("cancelled during discovery")),
        links = discoverer.discover(fetcher.as_ref(), &limiter, &config.source.listing_url) => links?,
    };
    stats.links_discovered = links.len();

    // Step 2: acquisition
    crate::utils::log::step(2, TOTAL_STEPS, "Acquire - Fetching event calendars");
    let cache = Arc::new(FreshnessCache::open(&config.cache.path, config.cache.ttl()).await);
    let acquirer = EventAcquirer::new(
        Arc::clone(&fetcher),
        Arc::clone(&limiter),
        cancel.clone(),
        &config.acquire,
    )?;
    let pool = WorkerPool::new(
        acquirer,
        Arc::clone(&cache),
        cancel.clone(),
        config.crawler.max_concurrent,
        config.crawler.grace_period(),
    );
    let outcomes = pool.run(&links).await?;
    stats.record_outcomes(&outcomes);
    stats.cache_degraded = cache.is_degraded();
    log::info!(
        "Cache: {} hits, {} misses, {} failures",
        stats.cache_hits,
        stats.cache_misses,
        stats.fetch_failures
    );

    // Step 3: merge
    crate::utils::log::step(3, TOTAL_STEPS, "Merge - Deduplicating events");
    let merged = merge(outcomes.into_iter().filter_map(|(_, o)| o.into_event()));
    stats.collisions = merged.collisions;
    stats.merged_events = merged.len();
    let content = merged.to_ics(&config.output);

    // Step 4: publish
    crate::utils::log::step(4, TOTAL_STEPS, "Publish - Writing merged calendar");
    if cancel.is_cancelled() {
        return Err(AppError::aborted("cancelled before publish"));
    }
    publish(&config.output.path, &content).await?;

    let report = RunReport {
        started_at,
        finished_at: Utc::now(),
        status: stats.status(),
        stats,
    };
    crate::utils::log::summary("Run complete", &crate::utils::log::report_items(&report));
    Ok(report)
}
