//! Gap filling for sparse, bucketed time series.
//!
//! The aggregation layer only emits buckets that contain records. Charts need
//! one entry per bucket, so [`densify`] walks the timeline from the window
//! start to the last observed bucket and synthesizes the missing entries
//! according to a per-field [`DefaultPolicy`].

use super::bucket::{bucket_distance, next_bucket, BucketKey, Granularity};
use super::window::WindowDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Data-format errors raised while building a dense series.
///
/// These indicate a bug in the upstream aggregation and are surfaced to the
/// caller as-is; there is no partial result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("bucket key {key} does not denote a calendar instant")]
    MalformedKey { key: BucketKey },
    #[error("bucket key {key} is not aligned to {granularity} buckets")]
    Misaligned {
        key: BucketKey,
        granularity: Granularity,
    },
    #[error("series is not strictly ascending: {current} follows {previous}")]
    NonMonotonic {
        previous: BucketKey,
        current: BucketKey,
    },
    #[error("entry {key} precedes the series start {start}")]
    EntryBeforeStart { key: BucketKey, start: BucketKey },
}

/// One bucket of a series: the key plus its metric fields.
///
/// Serializes as `{"_id": {"year": .., "month": .., "day": ..}, "count": 3, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesEntry {
    #[serde(rename = "_id")]
    pub key: BucketKey,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SeriesEntry {
    pub fn new(key: BucketKey) -> Self {
        Self {
            key,
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Value used for a field in a bucket with no observation.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultPolicy {
    /// Constant fill, for counts and sums over the period
    Zero(Value),
    /// Repeat the latest observed value; `initial` until one is observed
    CarryForward { initial: Value },
}

impl DefaultPolicy {
    pub fn zero() -> Self {
        DefaultPolicy::Zero(Value::from(0))
    }

    pub fn carry_forward(initial: impl Into<Value>) -> Self {
        DefaultPolicy::CarryForward {
            initial: initial.into(),
        }
    }
}

/// Per-field fill policies. Fields without a policy are left out of
/// synthesized entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillPolicy {
    fields: BTreeMap<String, DefaultPolicy>,
}

impl FillPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, policy: DefaultPolicy) -> Self {
        self.fields.insert(name.to_string(), policy);
        self
    }

    pub fn get(&self, name: &str) -> Option<&DefaultPolicy> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DefaultPolicy)> {
        self.fields.iter().map(|(name, policy)| (name.as_str(), policy))
    }
}

/// Latest observed value of every carry-forward field.
///
/// Only real entries update this state, so a run of gaps always repeats the
/// last genuine observation.
struct CarryState<'p> {
    policy: &'p FillPolicy,
    last_seen: BTreeMap<&'p str, Value>,
}

impl<'p> CarryState<'p> {
    fn new(policy: &'p FillPolicy) -> Self {
        Self {
            policy,
            last_seen: BTreeMap::new(),
        }
    }

    fn observe(&mut self, entry: &SeriesEntry) {
        for (name, policy) in self.policy.iter() {
            if let DefaultPolicy::CarryForward { .. } = policy {
                if let Some(value) = entry.fields.get(name) {
                    self.last_seen.insert(name, value.clone());
                }
            }
        }
    }

    fn synthesize(&self, key: BucketKey) -> SeriesEntry {
        let fields = self
            .policy
            .iter()
            .map(|(name, policy)| {
                let value = match policy {
                    DefaultPolicy::Zero(value) => value.clone(),
                    DefaultPolicy::CarryForward { initial } => self
                        .last_seen
                        .get(name)
                        .unwrap_or(initial)
                        .clone(),
                };
                (name.to_string(), value)
            })
            .collect();
        SeriesEntry { key, fields }
    }
}

/// Produce one entry per bucket from `start` through the last entry of
/// `sparse`, inclusive.
///
/// `sparse` must be strictly ascending, aligned to the window granularity and
/// must not begin before `start`. Real entries are emitted unchanged; missing
/// buckets are synthesized from `policy`. An empty input yields an empty
/// series.
pub fn densify(
    sparse: &[SeriesEntry],
    window: &WindowDescriptor,
    start: BucketKey,
    policy: &FillPolicy,
) -> Result<Vec<SeriesEntry>, SeriesError> {
    let granularity = window.granularity;
    let Some(last) = sparse.last() else {
        return Ok(Vec::new());
    };
    check_sparse(sparse, start, granularity)?;

    let len = bucket_distance(start, last.key, granularity)? + 1;
    let mut dense = Vec::with_capacity(usize::try_from(len).unwrap_or_default());
    let mut carry = CarryState::new(policy);
    let mut pending = sparse.iter().peekable();
    let mut current = start;

    while current <= last.key {
        match pending.next_if(|entry| entry.key == current) {
            Some(entry) => {
                carry.observe(entry);
                dense.push(entry.clone());
            }
            None => dense.push(carry.synthesize(current)),
        }
        current = next_bucket(current, granularity)?;
    }

    Ok(dense)
}

/// [`densify`] starting at [`WindowDescriptor::start_bucket`].
pub fn densify_window(
    sparse: &[SeriesEntry],
    window: &WindowDescriptor,
    policy: &FillPolicy,
) -> Result<Vec<SeriesEntry>, SeriesError> {
    densify(sparse, window, window.start_bucket(sparse), policy)
}

fn check_sparse(
    sparse: &[SeriesEntry],
    start: BucketKey,
    granularity: Granularity,
) -> Result<(), SeriesError> {
    start.validate(granularity)?;
    for entry in sparse {
        entry.key.validate(granularity)?;
    }
    for pair in sparse.windows(2) {
        if pair[1].key <= pair[0].key {
            return Err(SeriesError::NonMonotonic {
                previous: pair[0].key,
                current: pair[1].key,
            });
        }
    }
    match sparse.first() {
        Some(first) if first.key < start => Err(SeriesError::EntryBeforeStart {
            key: first.key,
            start,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::window::{resolve, SymbolicWindow};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn monthly_window() -> WindowDescriptor {
        resolve(
            SymbolicWindow::Month,
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
        )
    }

    fn day(d: u32) -> BucketKey {
        BucketKey::day(2024, 1, d)
    }

    #[test]
    fn test_empty_input_yields_empty_series() {
        let policy = FillPolicy::new().field("count", DefaultPolicy::zero());
        let dense = densify(&[], &monthly_window(), day(1), &policy).unwrap();
        assert!(dense.is_empty());
    }

    #[test]
    fn test_single_entry_at_start() {
        let policy = FillPolicy::new().field("count", DefaultPolicy::zero());
        let sparse = vec![SeriesEntry::new(day(1)).with("count", 4)];
        let dense = densify(&sparse, &monthly_window(), day(1), &policy).unwrap();
        assert_eq!(dense, sparse);
    }

    #[test]
    fn test_single_entry_after_start_is_padded() {
        let policy = FillPolicy::new().field("count", DefaultPolicy::zero());
        let sparse = vec![SeriesEntry::new(day(3)).with("count", 4)];
        let dense = densify(&sparse, &monthly_window(), day(1), &policy).unwrap();
        assert_eq!(dense.len(), 3);
        assert_eq!(dense[0], SeriesEntry::new(day(1)).with("count", 0));
        assert_eq!(dense[1], SeriesEntry::new(day(2)).with("count", 0));
        assert_eq!(dense[2], sparse[0]);
    }

    #[test]
    fn test_carry_forward_uses_last_real_value() {
        let policy = FillPolicy::new().field("field", DefaultPolicy::carry_forward(5));
        let sparse = vec![
            SeriesEntry::new(day(1)).with("field", 10),
            SeriesEntry::new(day(4)).with("field", 20),
        ];
        let dense = densify(&sparse, &monthly_window(), day(1), &policy).unwrap();
        let values: Vec<_> = dense.iter().map(|e| e.get("field").cloned()).collect();
        assert_eq!(
            values,
            vec![Some(json!(10)), Some(json!(10)), Some(json!(10)), Some(json!(20))]
        );
    }

    #[test]
    fn test_carry_forward_initial_before_first_observation() {
        let policy = FillPolicy::new().field("floorPrice", DefaultPolicy::carry_forward(Value::Null));
        let sparse = vec![SeriesEntry::new(day(3)).with("floorPrice", 1.5)];
        let dense = densify(&sparse, &monthly_window(), day(1), &policy).unwrap();
        assert_eq!(dense[0].get("floorPrice"), Some(&Value::Null));
        assert_eq!(dense[1].get("floorPrice"), Some(&Value::Null));
        assert_eq!(dense[2].get("floorPrice"), Some(&json!(1.5)));
    }

    #[test]
    fn test_carry_forward_skips_real_entries_missing_the_field() {
        let policy = FillPolicy::new().field("holders", DefaultPolicy::carry_forward(0));
        let sparse = vec![
            SeriesEntry::new(day(1)).with("holders", 7),
            SeriesEntry::new(day(2)).with("other", 1),
            SeriesEntry::new(day(4)).with("other", 2),
        ];
        let dense = densify(&sparse, &monthly_window(), day(1), &policy).unwrap();
        assert_eq!(dense[1], sparse[1]);
        assert_eq!(dense[2], SeriesEntry::new(day(3)).with("holders", 7));
    }

    #[test]
    fn test_zero_fill() {
        let policy = FillPolicy::new().field("field", DefaultPolicy::Zero(json!(0)));
        let sparse = vec![
            SeriesEntry::new(day(1)).with("field", 10),
            SeriesEntry::new(day(4)).with("field", 20),
        ];
        let dense = densify(&sparse, &monthly_window(), day(1), &policy).unwrap();
        assert_eq!(dense[1].get("field"), Some(&json!(0)));
        assert_eq!(dense[2].get("field"), Some(&json!(0)));
    }

    #[test]
    fn test_mixed_policies() {
        let policy = FillPolicy::new()
            .field("volume", DefaultPolicy::zero())
            .field("floorPrice", DefaultPolicy::carry_forward(Value::Null));
        let sparse = vec![
            SeriesEntry::new(day(1)).with("volume", 3.0).with("floorPrice", 2.0),
            SeriesEntry::new(day(3)).with("volume", 1.0).with("floorPrice", 1.8),
        ];
        let dense = densify(&sparse, &monthly_window(), day(1), &policy).unwrap();
        assert_eq!(
            dense[1],
            SeriesEntry::new(day(2)).with("floorPrice", 2.0).with("volume", 0)
        );
    }

    #[test]
    fn test_contiguity_and_fidelity_across_month_boundary() {
        let window = monthly_window();
        let policy = FillPolicy::new().field("count", DefaultPolicy::zero());
        let start = BucketKey::day(2024, 1, 25);
        let sparse = vec![
            SeriesEntry::new(BucketKey::day(2024, 1, 27)).with("count", 1),
            SeriesEntry::new(BucketKey::day(2024, 2, 2)).with("count", 2),
            SeriesEntry::new(BucketKey::day(2024, 3, 1)).with("count", 3),
        ];
        let dense = densify(&sparse, &window, start, &policy).unwrap();

        let expected_len =
            bucket_distance(start, BucketKey::day(2024, 3, 1), Granularity::Day).unwrap() + 1;
        assert_eq!(dense.len() as i64, expected_len);
        assert_eq!(dense.first().unwrap().key, start);
        for pair in dense.windows(2) {
            assert_eq!(next_bucket(pair[0].key, Granularity::Day).unwrap(), pair[1].key);
        }
        for entry in &sparse {
            assert!(dense.contains(entry));
        }
        assert!(dense.iter().any(|e| e.key == BucketKey::day(2024, 2, 29)));
    }

    #[test]
    fn test_two_hour_walk() {
        let window = resolve(
            SymbolicWindow::Week,
            Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap(),
        );
        let policy = FillPolicy::new().field("count", DefaultPolicy::zero());
        let sparse = vec![
            SeriesEntry::new(BucketKey::hour(2024, 6, 1, 0)).with("count", 3),
            SeriesEntry::new(BucketKey::hour(2024, 6, 1, 4)).with("count", 5),
        ];
        let dense = densify_window(&sparse, &window, &policy).unwrap();
        let keys: Vec<_> = dense.iter().map(|e| e.key).collect();
        assert_eq!(
            keys,
            vec![
                BucketKey::hour(2024, 6, 1, 0),
                BucketKey::hour(2024, 6, 1, 2),
                BucketKey::hour(2024, 6, 1, 4),
            ]
        );
        assert_eq!(dense[1].get("count"), Some(&json!(0)));
    }

    #[test]
    fn test_all_time_starts_at_first_observation() {
        let window = resolve(
            SymbolicWindow::AllTime,
            Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap(),
        );
        let policy = FillPolicy::new().field("count", DefaultPolicy::zero());
        let sparse = vec![
            SeriesEntry::new(BucketKey::day(2024, 6, 5)).with("count", 1),
            SeriesEntry::new(BucketKey::day(2024, 6, 7)).with("count", 1),
        ];
        let dense = densify_window(&sparse, &window, &policy).unwrap();
        assert_eq!(dense.len(), 3);
        assert_eq!(dense[0], sparse[0]);
    }

    #[test]
    fn test_rejects_descending_and_duplicate_keys() {
        let policy = FillPolicy::new();
        let descending = vec![SeriesEntry::new(day(3)), SeriesEntry::new(day(2))];
        assert_eq!(
            densify(&descending, &monthly_window(), day(1), &policy),
            Err(SeriesError::NonMonotonic {
                previous: day(3),
                current: day(2)
            })
        );

        let duplicate = vec![SeriesEntry::new(day(2)), SeriesEntry::new(day(2))];
        assert!(matches!(
            densify(&duplicate, &monthly_window(), day(1), &policy),
            Err(SeriesError::NonMonotonic { .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_and_misaligned_keys() {
        let policy = FillPolicy::new();
        let malformed = vec![SeriesEntry::new(BucketKey::day(2024, 2, 30))];
        assert!(matches!(
            densify(&malformed, &monthly_window(), day(1), &policy),
            Err(SeriesError::MalformedKey { .. })
        ));

        let hourly = vec![SeriesEntry::new(BucketKey::hour(2024, 1, 2, 5))];
        assert!(matches!(
            densify(&hourly, &monthly_window(), day(1), &policy),
            Err(SeriesError::Misaligned { .. })
        ));
    }

    #[test]
    fn test_rejects_entry_before_start() {
        let policy = FillPolicy::new();
        let sparse = vec![SeriesEntry::new(day(1))];
        assert_eq!(
            densify(&sparse, &monthly_window(), day(2), &policy),
            Err(SeriesError::EntryBeforeStart {
                key: day(1),
                start: day(2)
            })
        );
    }

    #[test]
    fn test_entry_serialization() {
        let entry = SeriesEntry::new(BucketKey::hour(2024, 6, 1, 4)).with("count", 5);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"_id": {"year": 2024, "month": 6, "day": 1, "hour": 4}, "count": 5})
        );
    }
}
