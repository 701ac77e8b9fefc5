//! Grouping of raw marketplace events into sparse, bucketed series.
//!
//! This is the in-process counterpart of a database `$group` stage: events
//! inside the window are keyed with [`bucket_key_of`] and reduced per metric.
//! The output is ascending and contains only buckets that had events, ready
//! for [`crate::domain::densify`].

use crate::domain::{
    bucket_key_of, BucketKey, CollectionConfig, EventKind, MarketEvent, Metric, SeriesEntry,
    WindowDescriptor,
};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Sales totals over a whole window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SalesTotals {
    pub count: u64,
    pub volume: f64,
    pub floor_price: Option<f64>,
}

/// Group `events` into one entry per non-empty bucket for `metric`.
///
/// Events before the cutoff, after `now` or with unrepresentable timestamps
/// are dropped.
pub fn aggregate(
    events: &[MarketEvent],
    metric: Metric,
    collection: &CollectionConfig,
    window: &WindowDescriptor,
) -> Vec<SeriesEntry> {
    let mut buckets: BTreeMap<BucketKey, Vec<&MarketEvent>> = BTreeMap::new();
    let mut skipped = 0usize;

    for event in events.iter().filter(|e| is_relevant(metric, e)) {
        match event.occurred_at() {
            Some(instant) if window.contains(instant) => {
                buckets
                    .entry(bucket_key_of(instant, window.granularity))
                    .or_default()
                    .push(event);
            }
            Some(instant) if instant > window.now => skipped += 1,
            Some(_) => {}
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(
            "Skipped {} {} events with invalid or future timestamps for {}",
            skipped,
            metric.as_str(),
            collection.slug
        );
    }

    buckets
        .into_iter()
        .filter_map(|(key, events)| reduce(metric, collection, key, &events))
        .collect()
}

/// Sales count, volume and floor across the whole window (no bucketing).
pub fn sales_totals(events: &[MarketEvent], window: &WindowDescriptor) -> SalesTotals {
    events
        .iter()
        .filter(|e| e.occurred_at().is_some_and(|t| window.contains(t)))
        .fold(SalesTotals::default(), |mut totals, event| {
            if event.kind == EventKind::Sale {
                totals.count += 1;
                totals.volume += event.price.unwrap_or(0.0);
            }
            if matches!(event.kind, EventKind::Sale | EventKind::Listing) {
                totals.floor_price = min_price(totals.floor_price, event.price);
            }
            totals
        })
}

fn is_relevant(metric: Metric, event: &MarketEvent) -> bool {
    match metric {
        Metric::Sales => event.kind == EventKind::Sale,
        Metric::Transfers => event.kind == EventKind::Transfer,
        Metric::Mints => event.kind == EventKind::Mint,
        Metric::FloorPrice | Metric::MarketCap => {
            matches!(event.kind, EventKind::Sale | EventKind::Listing) && event.price.is_some()
        }
    }
}

fn reduce(
    metric: Metric,
    collection: &CollectionConfig,
    key: BucketKey,
    events: &[&MarketEvent],
) -> Option<SeriesEntry> {
    let entry = SeriesEntry::new(key);
    let count = events.len() as u64;

    let entry = match metric {
        Metric::Sales => {
            let volume: f64 = events.iter().filter_map(|e| e.price).sum();
            entry
                .with("count", count)
                .with("volume", json!(volume))
                .with("avgPrice", json!(volume / count as f64))
        }
        Metric::Transfers => {
            let receivers: HashSet<&str> = events.iter().filter_map(|e| e.to.as_deref()).collect();
            entry
                .with("count", count)
                .with("uniqueReceivers", receivers.len() as u64)
        }
        Metric::Mints => entry.with("count", count),
        Metric::FloorPrice => {
            let floor = events.iter().fold(None, |floor, e| min_price(floor, e.price))?;
            entry.with("floorPrice", json!(floor))
        }
        Metric::MarketCap => {
            let floor = events.iter().fold(None, |floor, e| min_price(floor, e.price))?;
            let supply = collection.supply?;
            entry.with("marketCap", json!(floor * supply as f64))
        }
    };
    Some(entry)
}

fn min_price(current: Option<f64>, candidate: Option<f64>) -> Option<f64> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (None, b) => b,
        (a, None) => a,
    }
}
