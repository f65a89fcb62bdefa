// src/utils/log.rs

//! Run-level log formatting on top of the `log` facade.
//!
//! Per-event detail goes straight through `log::debug!`/`log::warn!` at the
//! call site. These helpers only shape the few lines an operator scans
//! for: the run header, numbered steps and the closing summary.

use crate::models::RunReport;

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    ::log::info!("{}", border);
    ::log::info!("  {}", title);
    ::log::info!("{}", border);
}

/// Log a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    ::log::info!("[STEP {}/{}] {}", step_num, total, message);
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    ::log::info!("[SUMMARY] {}", title);
    for (key, value) in items {
        ::log::info!("    {}: {}", key, value);
    }
}

/// Key/value pairs describing a finished run.
pub fn report_items(report: &RunReport) -> Vec<(&'static str, String)> {
    let stats = &report.stats;
    let elapsed = report.finished_at - report.started_at;
    vec![
        ("Status", format!("{:?}", report.status)),
        ("Links discovered", stats.links_discovered.to_string()),
        ("Cache hits", stats.cache_hits.to_string()),
        ("Cache misses", stats.cache_misses.to_string()),
        ("Added/updated", stats.changed.to_string()),
        ("Unchanged", stats.unchanged.to_string()),
        ("Fetch failures", stats.fetch_failures.to_string()),
        ("UID collisions", stats.collisions.to_string()),
        ("Merged events", stats.merged_events.to_string()),
        ("Cache degraded", stats.cache_degraded.to_string()),
        ("Elapsed", format!("{}ms", elapsed.num_milliseconds())),
    ]
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{RunStats, RunStatus};

    #[test]
    fn report_items_cover_every_counter() {
        let now = Utc::now();
        let report = RunReport {
            started_at: now,
            finished_at: now,
            stats: RunStats {
                links_discovered: 3,
                merged_events: 2,
                fetch_failures: 1,
                ..RunStats::default()
            },
            status: RunStatus::PartialSuccess,
        };
        let items = report_items(&report);
        assert_eq!(items[0], ("Status", "PartialSuccess".to_string()));
        assert!(items.contains(&("Merged events", "2".to_string())));
        assert!(items.contains(&("Fetch failures", "1".to_string())));
    }
}
