// src/dedup.rs
//! Collapse listings that describe the same weekly event.
//!
//! The key is (venue, weekday, city). It deliberately ignores address, phone,
//! url and source, so two different venues sharing a name in the same city on
//! the same night collapse into one record.

use metrics::counter;
use std::collections::HashSet;

use crate::ingest::types::NormalizedEvent;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    venue: String,
    day: String,
    city: String,
}

impl DedupKey {
    pub fn of(ev: &NormalizedEvent) -> Self {
        Self {
            venue: ev.venue_name.trim().to_lowercase(),
            day: ev.day_of_week.clone().unwrap_or_default(),
            city: ev.city.trim().to_lowercase(),
        }
    }
}

/// Keep the first record per key, in input order. Later duplicates are dropped whole.
pub fn dedupe(events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
    let mut seen: HashSet<DedupKey> = HashSet::with_capacity(events.len());
    let mut keep = Vec::with_capacity(events.len());
    let mut dropped = 0u64;

    for ev in events {
        if !seen.insert(DedupKey::of(&ev)) {
            dropped += 1;
            continue;
        }
        keep.push(ev);
    }

    counter!("aggregate_dedup_total").increment(dropped);
    keep
}
