//! Bucket keys: calendar timestamps truncated to a series granularity.
//!
//! Every time series served by the gateway is grouped by a [`BucketKey`]. The
//! upstream aggregation and the densifier must agree on how an instant maps to
//! a key, so both go through [`bucket_key_of`] and [`next_bucket`].

use super::series::SeriesError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Temporal size of one bucket in a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    /// One bucket per hour
    Hour,
    /// One bucket per two hours, hour floored to an even number
    TwoHour,
    /// One bucket per calendar day (UTC)
    Day,
}

impl Granularity {
    /// Distance between two consecutive buckets.
    pub fn step(self) -> Duration {
        match self {
            Granularity::Hour => Duration::hours(1),
            Granularity::TwoHour => Duration::hours(2),
            Granularity::Day => Duration::days(1),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::TwoHour => "two-hour",
            Granularity::Day => "day",
        }
    }

    fn truncate_hour(self, hour: u32) -> Option<u32> {
        match self {
            Granularity::Hour => Some(hour),
            Granularity::TwoHour => Some(hour - hour % 2),
            Granularity::Day => None,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar fields of an instant truncated to a granularity.
///
/// Serialized the same way the aggregation layer groups records:
/// `{"year": 2024, "month": 6, "day": 1, "hour": 4}` with `hour` omitted for
/// daily buckets. Field order matters: the derived `Ord` compares year, month,
/// day, then hour, which matches the order of the instants the keys denote.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
pub struct BucketKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
}

impl BucketKey {
    /// Key of a daily bucket.
    pub fn day(year: i32, month: u32, day: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour: None,
        }
    }

    /// Key of an hourly (or two-hourly) bucket.
    pub fn hour(year: i32, month: u32, day: u32, hour: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour: Some(hour),
        }
    }

    /// Reconstruct the instant at which this bucket begins.
    pub fn to_datetime(&self) -> Result<DateTime<Utc>, SeriesError> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|date| date.and_hms_opt(self.hour.unwrap_or(0), 0, 0))
            .map(|naive| naive.and_utc())
            .ok_or(SeriesError::MalformedKey { key: *self })
    }

    /// Check that the key denotes a real instant and has the shape expected
    /// for `granularity` (hour present, and even for two-hour buckets).
    pub fn validate(&self, granularity: Granularity) -> Result<(), SeriesError> {
        let instant = self.to_datetime()?;
        if bucket_key_of(instant, granularity) != *self {
            return Err(SeriesError::Misaligned {
                key: *self,
                granularity,
            });
        }
        Ok(())
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)?;
        if let Some(hour) = self.hour {
            write!(f, "T{:02}", hour)?;
        }
        Ok(())
    }
}

/// Truncate `instant` to the bucket that contains it.
pub fn bucket_key_of(instant: DateTime<Utc>, granularity: Granularity) -> BucketKey {
    BucketKey {
        year: instant.year(),
        month: instant.month(),
        day: instant.day(),
        hour: granularity.truncate_hour(instant.hour()),
    }
}

/// The bucket immediately after `key`, rolling over days, months and years.
pub fn next_bucket(key: BucketKey, granularity: Granularity) -> Result<BucketKey, SeriesError> {
    key.validate(granularity)?;
    let next = key
        .to_datetime()?
        .checked_add_signed(granularity.step())
        .ok_or(SeriesError::MalformedKey { key })?;
    Ok(bucket_key_of(next, granularity))
}

/// Number of `granularity` steps from `from` to `to` (negative when `to` is earlier).
pub fn bucket_distance(
    from: BucketKey,
    to: BucketKey,
    granularity: Granularity,
) -> Result<i64, SeriesError> {
    let span = to.to_datetime()? - from.to_datetime()?;
    Ok(span.num_seconds() / granularity.step().num_seconds())
}
