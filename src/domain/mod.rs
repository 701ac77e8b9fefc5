//! Domain layer - Time bucketing, gap filling and repository traits.
//!
//! This module holds the parts of the gateway that have no I/O:
//! - Window resolution (`24h`, `7d`, ... → cutoff + granularity)
//! - Bucket keys and the step function between buckets
//! - Densification of sparse aggregation results
//! - NFT marketplace models and response types
//!
//! It also defines the traits through which the application layer talks to
//! the cache and the upstream marketplace.

pub mod bucket;
pub mod nft_models;
pub mod series;
pub mod window;

pub use bucket::{bucket_distance, bucket_key_of, next_bucket, BucketKey, Granularity};
pub use nft_models::*;
pub use series::{densify, densify_window, DefaultPolicy, FillPolicy, SeriesEntry, SeriesError};
pub use window::{resolve, SymbolicWindow, WindowDescriptor};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of raw marketplace events.
///
/// Implementations must return only events at or after `since` when it is
/// set. Ordering is not required; the aggregation sorts by bucket.
///
/// # Implementations
///
/// See `infrastructure::marketplace_client::MarketplaceClient` for the HTTP implementation.
#[async_trait]
pub trait MarketDataRepository: Send + Sync {
    /// Fetch events for `collection`, optionally bounded below by `since`.
    ///
    /// # Errors
    ///
    /// - Returns error if the upstream API is unreachable after retries
    /// - Returns error if the response cannot be decoded
    async fn fetch_events(
        &self,
        collection: &CollectionConfig,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<MarketEvent>>;
}

/// Repository trait for caching operations.
///
/// A plain key/value store with per-key expiry; values are serialized JSON
/// response bodies.
///
/// # Implementations
///
/// See `infrastructure::redis::RedisRepository` for the Redis implementation.
#[async_trait]
pub trait CacheRepository: Send + Sync {
    /// Retrieve a cached value by key.
    ///
    /// Returns `Ok(None)` on a miss or an expired key; never errors on a miss.
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Store a value with a time-to-live in seconds.
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<()>;

    /// `false` when the store is a no-op (no backend configured).
    fn is_enabled(&self) -> bool {
        true
    }
}
