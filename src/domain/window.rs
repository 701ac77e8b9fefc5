//! Resolution of symbolic time windows (`24h`, `7d`, ...) into a cutoff
//! instant and a bucketing granularity.
//!
//! The token → (lookback, granularity) mapping lives in a single table so the
//! aggregation and the densifier always agree on bucket semantics.

use super::bucket::{bucket_key_of, BucketKey, Granularity};
use super::series::SeriesEntry;
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

/// Relative lookback period requested by a client through the `time` query
/// parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum SymbolicWindow {
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "3m")]
    Quarter,
    #[serde(rename = "1y")]
    Year,
    #[serde(rename = "all")]
    AllTime,
}

/// How far back a bounded window reaches from `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookback {
    Days(i64),
    /// Calendar months, clamped to the last valid day of the target month.
    Months(u32),
}

impl Lookback {
    fn subtract_from(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Lookback::Days(days) => now.checked_sub_signed(Duration::days(days)),
            Lookback::Months(months) => now.checked_sub_months(Months::new(months)),
        }
    }
}

struct WindowSpec {
    window: SymbolicWindow,
    token: &'static str,
    lookback: Lookback,
    granularity: Granularity,
}

static WINDOW_TABLE: [WindowSpec; 5] = [
    WindowSpec {
        window: SymbolicWindow::Day,
        token: "24h",
        lookback: Lookback::Days(1),
        granularity: Granularity::Hour,
    },
    WindowSpec {
        window: SymbolicWindow::Week,
        token: "7d",
        lookback: Lookback::Days(7),
        granularity: Granularity::TwoHour,
    },
    WindowSpec {
        window: SymbolicWindow::Month,
        token: "30d",
        lookback: Lookback::Days(30),
        granularity: Granularity::Day,
    },
    WindowSpec {
        window: SymbolicWindow::Quarter,
        token: "3m",
        lookback: Lookback::Months(3),
        granularity: Granularity::Day,
    },
    WindowSpec {
        window: SymbolicWindow::Year,
        token: "1y",
        lookback: Lookback::Months(12),
        granularity: Granularity::Day,
    },
];

/// Token accepted as an explicit spelling of "all time".
const ALL_TIME_TOKEN: &str = "all";

impl SymbolicWindow {
    /// Parse the `time` query parameter.
    ///
    /// Absent, empty and unrecognized tokens all resolve to [`SymbolicWindow::AllTime`];
    /// unrecognized ones are logged so client mistakes remain visible.
    pub fn from_token(token: Option<&str>) -> Self {
        let token = match token.map(str::trim) {
            None | Some("") => return SymbolicWindow::AllTime,
            Some(t) if t.eq_ignore_ascii_case(ALL_TIME_TOKEN) => return SymbolicWindow::AllTime,
            Some(t) => t,
        };

        WINDOW_TABLE
            .iter()
            .find(|spec| spec.token == token)
            .map(|spec| spec.window)
            .unwrap_or_else(|| {
                warn!(token = %token, "Unrecognized time window, falling back to all-time");
                SymbolicWindow::AllTime
            })
    }

    /// Canonical token for this window (`"all"` for all-time).
    pub fn as_token(self) -> &'static str {
        self.spec().map_or(ALL_TIME_TOKEN, |spec| spec.token)
    }

    /// Grouping granularity; depends only on the window, never on `now`.
    pub fn granularity(self) -> Granularity {
        self.spec().map_or(Granularity::Day, |spec| spec.granularity)
    }

    pub fn is_bounded(self) -> bool {
        self.spec().is_some()
    }

    fn spec(self) -> Option<&'static WindowSpec> {
        WINDOW_TABLE.iter().find(|spec| spec.window == self)
    }
}

/// A window resolved against a reference instant. Created per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDescriptor {
    pub window: SymbolicWindow,
    /// Reference instant the window was resolved against
    pub now: DateTime<Utc>,
    /// Start of the window; `None` means no lower bound (all-time)
    pub cutoff: Option<DateTime<Utc>>,
    pub granularity: Granularity,
}

/// Resolve `window` against `now`.
///
/// Month and year windows use calendar arithmetic: `1y` from 2024-02-29 lands
/// on 2023-02-28 and `3m` from 2023-05-31 on 2023-02-28.
pub fn resolve(window: SymbolicWindow, now: DateTime<Utc>) -> WindowDescriptor {
    let cutoff = window
        .spec()
        .and_then(|spec| spec.lookback.subtract_from(now));

    WindowDescriptor {
        window,
        now,
        cutoff,
        granularity: window.granularity(),
    }
}

impl WindowDescriptor {
    /// First bucket a dense series for this window should contain.
    ///
    /// Bounded windows start at the cutoff bucket. All-time windows start at
    /// the earliest observed bucket so no empty history is synthesized before
    /// the collection existed; with no data at all, the bucket of `now`.
    pub fn start_bucket(&self, sparse: &[SeriesEntry]) -> BucketKey {
        match self.cutoff {
            Some(cutoff) => bucket_key_of(cutoff, self.granularity),
            None => sparse
                .first()
                .map(|entry| entry.key)
                .unwrap_or_else(|| bucket_key_of(self.now, self.granularity)),
        }
    }

    /// Whether a raw record at `instant` falls inside the window: at or after
    /// the cutoff and no later than `now`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant <= self.now && self.cutoff.map_or(true, |cutoff| instant >= cutoff)
    }
}
