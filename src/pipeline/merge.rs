// src/pipeline/merge.rs

//! Merge collected events and publish the combined calendar.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::ics;
use crate::models::{Event, OutputConfig};
use crate::storage::StagedWrite;

/// Deduplicated events in publication order.
#[derive(Debug, Clone, Default)]
pub struct MergedCalendar {
    pub events: Vec<Event>,
    /// Events dropped because another event had the same UID
    pub collisions: usize,
}

impl MergedCalendar {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Serialize to iCalendar text.
    pub fn to_ics(&self, meta: &OutputConfig) -> String {
        ics::generate_calendar(&self.events, meta)
    }
}

/// Deduplicate by UID and order by start time.
///
/// On a UID collision the event fetched most recently wins; equal fetch
/// times fall back to the lexically smallest source URL, so the result does
/// not depend on input order.
pub fn merge(events: impl IntoIterator<Item = Event>) -> MergedCalendar {
    let mut by_uid: BTreeMap<String, Event> = BTreeMap::new();
    let mut collisions = 0;

    for event in events {
        match by_uid.entry(event.uid.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(event);
            }
            Entry::Occupied(mut slot) => {
                collisions += 1;
                let (kept, dropped) = if supersedes(&event, slot.get()) {
                    let dropped = slot.insert(event);
                    (slot.get().source_url.clone(), dropped.source_url)
                } else {
                    (slot.get().source_url.clone(), event.source_url)
                };
                log::warn!(
                    "Duplicate UID {}: keeping {} over {}",
                    slot.key(),
                    kept,
                    dropped
                );
            }
        }
    }

    let mut events: Vec<Event> = by_uid.into_values().collect();
    events.sort_by(|a, b| {
        a.start
            .sort_key()
            .cmp(&b.start.sort_key())
            .then_with(|| a.uid.cmp(&b.uid))
    });

    MergedCalendar { events, collisions }
}

fn supersedes(candidate: &Event, current: &Event) -> bool {
    match candidate.fetched_at.cmp(&current.fetched_at) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.source_url < current.source_url,
    }
}

/// Atomically replace the artifact at `path` with `content`.
///
/// On failure the temp file is removed and any previous artifact is left
/// untouched.
pub async fn publish(path: &Path, content: &str) -> Result<()> {
    let staged = StagedWrite::stage(path, content.as_bytes())
        .await
        .map_err(|e| AppError::publish(path.display(), e))?;
    staged
        .commit()
        .await
        .map_err(|e| AppError::publish(path.display(), e))?;
    log::info!("Published {} ({} bytes)", path.display(), content.len());
    Ok(())
}
