//! Domain models for NFT marketplace data and the analytics responses built
//! from it.

use super::bucket::Granularity;
use super::series::{DefaultPolicy, FillPolicy, SeriesEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

// ============================================================================
// Collections & Events
// ============================================================================

/// A collection the gateway serves analytics for, from `config.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CollectionConfig {
    /// URL slug used in API paths (e.g., "pudgy-penguins")
    pub slug: String,
    /// Display name
    pub name: String,
    /// Contract address on the upstream marketplace; defaults to the slug
    #[serde(default)]
    pub contract: Option<String>,
    /// Total token supply, required for market cap series
    #[serde(default)]
    pub supply: Option<u64>,
}

impl CollectionConfig {
    /// Identifier sent to the upstream events API.
    pub fn upstream_id(&self) -> &str {
        self.contract.as_deref().unwrap_or(&self.slug)
    }
}

/// Kind of a raw marketplace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Sale,
    Transfer,
    Mint,
    Listing,
}

/// Raw marketplace event as returned by the upstream events API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarketEvent {
    pub kind: EventKind,
    #[serde(default)]
    pub token_id: Option<String>,
    /// Price in the marketplace's native currency (sales and listings)
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    /// Event time (milliseconds since epoch)
    pub timestamp: i64,
}

impl MarketEvent {
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Time series exposed per collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    /// Sales count, volume and average price per bucket
    Sales,
    /// Transfer count and distinct receivers per bucket
    Transfers,
    /// Mint count per bucket
    Mints,
    /// Lowest sale or listing price per bucket
    FloorPrice,
    /// Floor price times configured supply
    MarketCap,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Sales,
        Metric::Transfers,
        Metric::Mints,
        Metric::FloorPrice,
        Metric::MarketCap,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Sales => "sales",
            Metric::Transfers => "transfers",
            Metric::Mints => "mints",
            Metric::FloorPrice => "floor-price",
            Metric::MarketCap => "market-cap",
        }
    }

    /// Fill policy for buckets without events. Period totals are zero-filled;
    /// state metrics repeat the last observed value.
    pub fn fill_policy(self) -> FillPolicy {
        match self {
            Metric::Sales => FillPolicy::new()
                .field("count", DefaultPolicy::zero())
                .field("volume", DefaultPolicy::zero())
                .field("avgPrice", DefaultPolicy::zero()),
            Metric::Transfers => FillPolicy::new()
                .field("count", DefaultPolicy::zero())
                .field("uniqueReceivers", DefaultPolicy::zero()),
            Metric::Mints => FillPolicy::new().field("count", DefaultPolicy::zero()),
            Metric::FloorPrice => {
                FillPolicy::new().field("floorPrice", DefaultPolicy::carry_forward(Value::Null))
            }
            Metric::MarketCap => {
                FillPolicy::new().field("marketCap", DefaultPolicy::carry_forward(Value::Null))
            }
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Dense time series for one collection metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeriesResponse {
    pub collection: String,
    pub metric: Metric,
    /// Window token ("24h", "7d", "30d", "3m", "1y" or "all")
    pub time: String,
    pub granularity: Granularity,
    /// Window start (RFC 3339); absent for all-time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<DateTime<Utc>>,
    /// Number of buckets that contained real data
    pub observed: usize,
    /// One entry per bucket: `{"_id": {year, month, day, hour?}, ...fields}`
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<SeriesEntry>,
}

/// Sales totals for one collection within a window.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub slug: String,
    pub name: String,
    pub sales: u64,
    pub volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_price: Option<f64>,
}

/// Collections ranked by sales volume.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<DateTime<Utc>>,
    pub collections: Vec<LeaderboardEntry>,
}

/// Configured collections.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CollectionsResponse {
    pub collections: Vec<CollectionConfig>,
    pub count: usize,
}
