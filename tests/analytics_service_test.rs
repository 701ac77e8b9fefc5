//! Integration tests for AnalyticsService with a mocked marketplace.
//!
//! Run with: `cargo test --test analytics_service_test`

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use mockall::mock;
use nft_analytics_gateway::application::{AnalyticsError, AnalyticsService, CacheService};
use nft_analytics_gateway::domain::{
    BucketKey, CacheRepository, CollectionConfig, EventKind, Granularity, MarketDataRepository,
    MarketEvent, Metric, SymbolicWindow,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

mock! {
    pub Market {}

    #[async_trait]
    impl MarketDataRepository for Market {
        async fn fetch_events(
            &self,
            collection: &CollectionConfig,
            since: Option<DateTime<Utc>>,
        ) -> anyhow::Result<Vec<MarketEvent>>;
    }
}

#[derive(Default)]
struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl CacheRepository for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl_seconds: u64) -> anyhow::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn collections() -> Vec<CollectionConfig> {
    vec![
        CollectionConfig {
            slug: "azuki".to_string(),
            name: "Azuki".to_string(),
            contract: None,
            supply: Some(10_000),
        },
        CollectionConfig {
            slug: "milady".to_string(),
            name: "Milady Maker".to_string(),
            contract: None,
            supply: None,
        },
    ]
}

fn event(kind: EventKind, at: DateTime<Utc>, price: Option<f64>) -> MarketEvent {
    MarketEvent {
        kind,
        token_id: Some("1".to_string()),
        price,
        from: Some("0xaaa".to_string()),
        to: Some("0xbbb".to_string()),
        timestamp: at.timestamp_millis(),
    }
}

fn service(market: MockMarket) -> AnalyticsService {
    let cache = Arc::new(CacheService::new(Arc::new(MemoryCache::default())));
    AnalyticsService::new(Arc::new(market), cache, collections())
}

#[tokio::test]
async fn test_day_series_covers_every_hour_from_cutoff() {
    let now = Utc.with_ymd_and_hms(2024, 6, 8, 12, 0, 0).unwrap();
    let events = vec![
        event(EventKind::Sale, now - Duration::hours(3), Some(1.5)),
        event(EventKind::Sale, now - Duration::hours(1), Some(2.5)),
    ];

    let mut market = MockMarket::new();
    market
        .expect_fetch_events()
        .withf(move |collection, since| {
            collection.slug == "azuki" && *since == Some(now - Duration::hours(24))
        })
        .times(1)
        .returning(move |_, _| Ok(events.clone()));

    let service = service(market);
    let collection = service.collection("azuki").unwrap().clone();
    let response = service
        .series_at(&collection, Metric::Sales, SymbolicWindow::Day, now)
        .await
        .unwrap();

    assert_eq!(response.granularity, Granularity::Hour);
    assert_eq!(response.observed, 2);
    assert_eq!(response.data.len(), 24);
    assert_eq!(response.data[0].key, BucketKey::hour(2024, 6, 7, 12));
    assert_eq!(response.data[23].key, BucketKey::hour(2024, 6, 8, 11));
    assert_eq!(response.data[0].get("count"), Some(&json!(0)));
    assert_eq!(response.data[21].get("volume"), Some(&json!(1.5)));
    assert_eq!(response.data[23].get("count"), Some(&json!(1)));
}

#[tokio::test]
async fn test_market_cap_carries_floor_times_supply() {
    let now = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
    let day = |d| Utc.with_ymd_and_hms(2024, 6, d, 10, 0, 0).unwrap();
    let events = vec![
        event(EventKind::Listing, day(27), Some(2.0)),
        event(EventKind::Sale, day(29), Some(1.0)),
    ];

    let mut market = MockMarket::new();
    market
        .expect_fetch_events()
        .returning(move |_, _| Ok(events.clone()));

    let service = service(market);
    let collection = service.collection("azuki").unwrap().clone();
    let response = service
        .series_at(&collection, Metric::MarketCap, SymbolicWindow::AllTime, now)
        .await
        .unwrap();

    let caps: Vec<_> = response
        .data
        .iter()
        .map(|entry| entry.get("marketCap").cloned().unwrap())
        .collect();
    assert_eq!(caps, vec![json!(20_000.0), json!(20_000.0), json!(10_000.0)]);
}

#[tokio::test]
async fn test_unknown_collection_is_not_fetched() {
    let mut market = MockMarket::new();
    market.expect_fetch_events().times(0);

    let service = service(market);
    let err = service
        .metric_series("nope", Metric::Sales, Some("7d"), "k", false)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyticsError::UnknownCollection(slug) if slug == "nope"));
}

#[tokio::test]
async fn test_market_cap_requires_supply() {
    let mut market = MockMarket::new();
    market.expect_fetch_events().times(0);

    let service = service(market);
    let err = service
        .metric_series("milady", Metric::MarketCap, None, "k", false)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyticsError::MissingSupply(_)));
}

#[tokio::test]
async fn test_second_request_is_served_from_cache() {
    let recent = Utc::now() - Duration::hours(2);
    let mut market = MockMarket::new();
    market
        .expect_fetch_events()
        .times(1)
        .returning(move |_, _| Ok(vec![event(EventKind::Mint, recent, None)]));

    let service = service(market);
    let key = CacheService::request_signature(
        "/v1/collections/azuki/mints",
        &[("time".to_string(), "24h".to_string())],
    );

    let first = service
        .metric_series("azuki", Metric::Mints, Some("24h"), &key, false)
        .await
        .unwrap();
    let second = service
        .metric_series("azuki", Metric::Mints, Some("24h"), &key, false)
        .await
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_bypass_refetches_and_refreshes() {
    let recent = Utc::now() - Duration::hours(2);
    let mut market = MockMarket::new();
    market
        .expect_fetch_events()
        .times(2)
        .returning(move |_, _| Ok(vec![event(EventKind::Transfer, recent, None)]));

    let service = service(market);
    for bypass in [false, true] {
        let response = service
            .metric_series("azuki", Metric::Transfers, Some("7d"), "k", bypass)
            .await
            .unwrap();
        assert_eq!(response.observed, 1);
    }
}

#[tokio::test]
async fn test_upstream_failure_is_classified() {
    let mut market = MockMarket::new();
    market
        .expect_fetch_events()
        .returning(|_, _| Err(anyhow::anyhow!("connection reset")));

    let service = service(market);
    let err = service
        .metric_series("azuki", Metric::Sales, Some("30d"), "k", false)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyticsError::Upstream(_)));
}

#[tokio::test]
async fn test_leaderboard_ranks_by_volume_and_skips_failures() {
    let now = Utc.with_ymd_and_hms(2024, 6, 8, 0, 0, 0).unwrap();
    let mut market = MockMarket::new();
    market.expect_fetch_events().returning(move |collection, _| {
        if collection.slug == "milady" {
            anyhow::bail!("upstream timeout");
        }
        Ok(vec![
            event(EventKind::Sale, now - Duration::hours(5), Some(3.0)),
            event(EventKind::Sale, now - Duration::hours(4), Some(1.0)),
            // Outside the window
            event(EventKind::Sale, now - Duration::days(10), Some(50.0)),
        ])
    });

    let service = service(market);
    let response = service
        .leaderboard_at(SymbolicWindow::Week, now)
        .await
        .unwrap();

    assert_eq!(response.time, "7d");
    assert_eq!(response.collections.len(), 1);
    let azuki = &response.collections[0];
    assert_eq!(azuki.slug, "azuki");
    assert_eq!(azuki.sales, 2);
    assert_eq!(azuki.volume, 4.0);
    assert_eq!(azuki.floor_price, Some(1.0));
}
