//! Analytics service: time series and rankings over NFT marketplace events.
//!
//! Every series request follows the same pipeline:
//! 1. Resolve the `time` token into a cutoff and granularity
//! 2. Fetch raw events since the cutoff from the upstream marketplace
//! 3. Group them into a sparse series at the resolved granularity
//! 4. Densify the series with the metric's fill policy
//!
//! Finished responses are cached as JSON by [`CacheService`].

use crate::application::aggregation::{aggregate, sales_totals};
use crate::application::cache_service::{ttl, CacheService};
use crate::domain::{
    densify_window, resolve, CollectionConfig, CollectionsResponse, LeaderboardEntry,
    LeaderboardResponse, MarketDataRepository, MarketEvent, Metric, SeriesError,
    SeriesResponse, SymbolicWindow, WindowDescriptor,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Upstream requests in flight at once while building the leaderboard.
const LEADERBOARD_CONCURRENCY: usize = 4;

/// Failures of an analytics request, classified for HTTP mapping.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("unknown collection: {0}")]
    UnknownCollection(String),
    #[error("collection {0} has no configured supply")]
    MissingSupply(String),
    #[error("series data format error: {0}")]
    Series(#[from] SeriesError),
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

/// Service for collection analytics endpoints.
pub struct AnalyticsService {
    market: Arc<dyn MarketDataRepository>,
    cache: Arc<CacheService>,
    collections: Vec<CollectionConfig>,
}

impl AnalyticsService {
    pub fn new(
        market: Arc<dyn MarketDataRepository>,
        cache: Arc<CacheService>,
        collections: Vec<CollectionConfig>,
    ) -> Self {
        info!(
            "Initialized AnalyticsService with {} configured collections",
            collections.len()
        );
        Self {
            market,
            cache,
            collections,
        }
    }

    pub fn collections(&self) -> &[CollectionConfig] {
        &self.collections
    }

    /// Look up a configured collection by slug (case-insensitive).
    pub fn collection(&self, slug: &str) -> Result<&CollectionConfig, AnalyticsError> {
        self.collections
            .iter()
            .find(|c| c.slug.eq_ignore_ascii_case(slug))
            .ok_or_else(|| AnalyticsError::UnknownCollection(slug.to_string()))
    }

    /// Configured collections, cached like every other response.
    pub async fn list_collections(
        &self,
        cache_key: &str,
        bypass_cache: bool,
    ) -> Result<CollectionsResponse, AnalyticsError> {
        self.cache
            .get_or_compute(cache_key, ttl::COLLECTIONS_MINUTES, bypass_cache, || async {
                Ok(CollectionsResponse {
                    collections: self.collections.clone(),
                    count: self.collections.len(),
                })
            })
            .await
    }

    /// Dense series for `metric` of collection `slug` over the `time` window.
    #[instrument(skip(self, cache_key))]
    pub async fn metric_series(
        &self,
        slug: &str,
        metric: Metric,
        time: Option<&str>,
        cache_key: &str,
        bypass_cache: bool,
    ) -> Result<SeriesResponse, AnalyticsError> {
        let collection = self.collection(slug)?;
        let window = SymbolicWindow::from_token(time);

        self.cache
            .get_or_compute(cache_key, ttl::SERIES_MINUTES, bypass_cache, || {
                self.series_at(collection, metric, window, Utc::now())
            })
            .await
    }

    /// Build a series against an explicit reference instant, bypassing the cache.
    pub async fn series_at(
        &self,
        collection: &CollectionConfig,
        metric: Metric,
        window: SymbolicWindow,
        now: DateTime<Utc>,
    ) -> Result<SeriesResponse, AnalyticsError> {
        if metric == Metric::MarketCap && collection.supply.is_none() {
            return Err(AnalyticsError::MissingSupply(collection.slug.clone()));
        }

        let descriptor = resolve(window, now);
        let events = self
            .market
            .fetch_events(collection, descriptor.cutoff)
            .await?;
        build_series(collection, metric, &descriptor, &events)
    }

    /// Collections ranked by sales volume within the `time` window.
    ///
    /// Collections whose events cannot be fetched are logged and left out.
    #[instrument(skip(self, cache_key))]
    pub async fn leaderboard(
        &self,
        time: Option<&str>,
        cache_key: &str,
        bypass_cache: bool,
    ) -> Result<LeaderboardResponse, AnalyticsError> {
        let window = SymbolicWindow::from_token(time);
        self.cache
            .get_or_compute(cache_key, ttl::LEADERBOARD_MINUTES, bypass_cache, || {
                self.leaderboard_at(window, Utc::now())
            })
            .await
    }

    pub async fn leaderboard_at(
        &self,
        window: SymbolicWindow,
        now: DateTime<Utc>,
    ) -> Result<LeaderboardResponse, AnalyticsError> {
        let descriptor = resolve(window, now);

        let mut entries: Vec<LeaderboardEntry> = futures::stream::iter(&self.collections)
            .map(|collection| async move {
                let events = self.market.fetch_events(collection, descriptor.cutoff).await;
                (collection, events)
            })
            .buffer_unordered(LEADERBOARD_CONCURRENCY)
            .filter_map(|(collection, events)| async move {
                match events {
                    Ok(events) => {
                        let totals = sales_totals(&events, &descriptor);
                        Some(LeaderboardEntry {
                            slug: collection.slug.clone(),
                            name: collection.name.clone(),
                            sales: totals.count,
                            volume: totals.volume,
                            floor_price: totals.floor_price,
                        })
                    }
                    Err(e) => {
                        warn!("Failed to fetch events for {}: {:#}", collection.slug, e);
                        None
                    }
                }
            })
            .boxed()
            .collect()
            .await;

        entries.sort_by(|a, b| {
            b.volume
                .total_cmp(&a.volume)
                .then_with(|| a.slug.cmp(&b.slug))
        });

        Ok(LeaderboardResponse {
            time: window.as_token().to_string(),
            cutoff: descriptor.cutoff,
            collections: entries,
        })
    }

    /// Whether the response cache is reachable.
    pub async fn check_cache_health(&self) -> bool {
        self.cache.is_healthy().await
    }

    /// Whether responses are cached at all.
    pub fn cache_enabled(&self) -> bool {
        self.cache.is_enabled()
    }
}

/// Aggregate and densify `events` into the response for one metric.
pub fn build_series(
    collection: &CollectionConfig,
    metric: Metric,
    descriptor: &WindowDescriptor,
    events: &[MarketEvent],
) -> Result<SeriesResponse, AnalyticsError> {
    let sparse = aggregate(events, metric, collection, descriptor);
    let dense = densify_window(&sparse, descriptor, &metric.fill_policy())?;

    let synthesized = dense.len().saturating_sub(sparse.len());
    metrics::counter!("series_buckets_synthesized_total", "metric" => metric.as_str())
        .increment(synthesized as u64);
    info!(
        "Built {} series for {}: {} events, {} observed buckets, {} synthesized",
        metric.as_str(),
        collection.slug,
        events.len(),
        sparse.len(),
        synthesized
    );

    Ok(SeriesResponse {
        collection: collection.slug.clone(),
        metric,
        time: descriptor.window.as_token().to_string(),
        granularity: descriptor.granularity,
        cutoff: descriptor.cutoff,
        observed: sparse.len(),
        data: dense,
    })
}
