// src/storage/cache.rs

//! Freshness cache.
//!
//! One [`CacheRecord`] per event URL, held in a sharded concurrent map and
//! persisted to a single JSON file after every update. Workers update
//! different keys concurrently; writes to disk are serialized.
//!
//! The store never aborts a run. An unreadable or corrupt file starts an
//! empty cache, and a failed write only marks the cache degraded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{CacheRecord, FetchResult};
use crate::storage::local;

/// Record counts for the `info` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheSummary {
    pub records: usize,
    pub fresh: usize,
    pub servable: usize,
}

pub struct FreshnessCache {
    path: PathBuf,
    ttl: Duration,
    records: DashMap<String, CacheRecord>,
    persist_lock: Mutex<()>,
    degraded: AtomicBool,
}

impl FreshnessCache {
    /// Load the cache at `path`. Missing files start empty; unreadable or
    /// corrupt files start empty and mark the cache degraded.
    pub async fn open(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        let path = path.into();
        let (records, degraded) = match Self::load(&path).await {
            Ok(records) => {
                log::info!("Loaded {} cache records from {}", records.len(), path.display());
                (records, false)
            }
            Err(e) => {
                log::warn!("{}; starting with an empty cache", e);
                (BTreeMap::new(), true)
            }
        };

        Self {
            path,
            ttl,
            records: records.into_iter().collect(),
            persist_lock: Mutex::new(()),
            degraded: AtomicBool::new(degraded),
        }
    }

    async fn load(path: &Path) -> Result<BTreeMap<String, CacheRecord>> {
        local::read_json(path)
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| AppError::cache_io(path.display(), e))
    }

    pub fn should_fetch(&self, url: &str) -> bool {
        self.should_fetch_at(url, Utc::now())
    }

    /// True when there is no record or its last check is at least one TTL old.
    pub fn should_fetch_at(&self, url: &str, now: DateTime<Utc>) -> bool {
        self.records
            .get(url)
            .is_none_or(|record| !record.is_fresh(now, self.ttl))
    }

    pub fn get(&self, url: &str) -> Option<CacheRecord> {
        self.records.get(url).map(|r| r.clone())
    }

    pub async fn record_result(&self, url: &str, result: FetchResult) {
        self.record_result_at(url, result, Utc::now()).await
    }

    /// Upsert the record for `url` and persist before returning.
    ///
    /// A miss only moves `last_checked`, so the previous body and
    /// description survive for later runs.
    pub async fn record_result_at(&self, url: &str, result: FetchResult, now: DateTime<Utc>) {
        {
            let mut record = self
                .records
                .entry(url.to_string())
                .or_insert_with(|| CacheRecord::new(url, now));
            record.last_checked = now;
            if let FetchResult::Success {
                fingerprint,
                description,
                calendar,
            } = result
            {
                record.fingerprint = Some(fingerprint);
                record.description = description;
                record.calendar = Some(calendar);
                record.last_success = Some(now);
            }
        }

        if let Err(e) = self.persist().await {
            log::warn!("{}; continuing without a durable cache", e);
            self.degraded.store(true, Ordering::Relaxed);
        }
    }

    /// Write a sorted snapshot of every record.
    pub async fn persist(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        let snapshot: BTreeMap<String, CacheRecord> = self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        local::write_json(&self.path, &snapshot)
            .await
            .map_err(|e| AppError::cache_io(self.path.display(), e))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True once a load or persist has failed this run.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn summary(&self, now: DateTime<Utc>) -> CacheSummary {
        self.records
            .iter()
            .fold(CacheSummary::default(), |mut acc, entry| {
                acc.records += 1;
                if entry.is_fresh(now, self.ttl) {
                    acc.fresh += 1;
                    if entry.is_servable() {
                        acc.servable += 1;
                    }
                }
                acc
            })
    }

    #[cfg(test)]
    pub(crate) fn insert(&self, record: CacheRecord) {
        self.records.insert(record.url.clone(), record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const URL: &str = "https://example.com/events/fair";

    fn success(fingerprint: &str) -> FetchResult {
        FetchResult::Success {
            fingerprint: fingerprint.to_string(),
            description: "Rides and food".to_string(),
            calendar: "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_file_starts_empty_and_healthy() {
        let tmp = TempDir::new().unwrap();
        let cache = FreshnessCache::open(tmp.path().join("cache.json"), Duration::hours(6)).await;
        assert!(cache.is_empty());
        assert!(!cache.is_degraded());
        assert!(cache.should_fetch(URL));
    }

    #[tokio::test]
    async fn corrupt_file_degrades_to_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let cache = FreshnessCache::open(&path, Duration::hours(6)).await;
        assert!(cache.is_empty());
        assert!(cache.is_degraded());
    }

    #[tokio::test]
    async fn records_are_durable_before_returning() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cache.json");
        let cache = FreshnessCache::open(&path, Duration::hours(6)).await;

        cache.record_result(URL, success("abc")).await;

        let reopened = FreshnessCache::open(&path, Duration::hours(6)).await;
        let record = reopened.get(URL).unwrap();
        assert_eq!(record.fingerprint.as_deref(), Some("abc"));
        assert_eq!(record.description, "Rides and food");
        assert!(record.is_servable());
        assert!(!reopened.should_fetch(URL));
    }

    #[tokio::test]
    async fn ttl_governs_refetch() {
        let tmp = TempDir::new().unwrap();
        let cache = FreshnessCache::open(tmp.path().join("cache.json"), Duration::hours(6)).await;
        let checked = Utc::now();
        cache.record_result_at(URL, success("abc"), checked).await;

        assert!(!cache.should_fetch_at(URL, checked + Duration::hours(5)));
        assert!(cache.should_fetch_at(URL, checked + Duration::hours(6)));
    }

    #[tokio::test]
    async fn miss_keeps_previous_body() {
        let tmp = TempDir::new().unwrap();
        let cache = FreshnessCache::open(tmp.path().join("cache.json"), Duration::hours(6)).await;
        let first = Utc::now() - Duration::hours(8);
        cache.record_result_at(URL, success("abc"), first).await;
        cache.record_result(URL, FetchResult::Miss).await;

        let record = cache.get(URL).unwrap();
        assert_eq!(record.last_success, Some(first));
        assert!(record.last_checked > first);
        assert_eq!(record.fingerprint.as_deref(), Some("abc"));
        assert!(!record.is_servable());

        let summary = cache.summary(Utc::now());
        assert_eq!(
            summary,
            CacheSummary {
                records: 1,
                fresh: 1,
                servable: 0
            }
        );
    }

    #[tokio::test]
    async fn unwritable_store_marks_degraded() {
        let tmp = TempDir::new().unwrap();
        // Parent is a regular file, so the directory cannot be created
        let blocker = tmp.path().join("blocker");
        tokio::fs::write(&blocker, b"").await.unwrap();
        let cache = FreshnessCache::open(blocker.join("cache.json"), Duration::hours(6)).await;

        cache.record_result(URL, success("abc")).await;
        assert!(cache.is_degraded());
        assert_eq!(cache.len(), 1);
    }
}
