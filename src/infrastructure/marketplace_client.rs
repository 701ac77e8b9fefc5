//! HTTP client for the upstream NFT marketplace events API.
//!
//! Events are fetched page by page (`continuation` cursor) with retry and
//! exponential backoff on transport errors.

use crate::config::UpstreamConfig;
use crate::domain::{CollectionConfig, MarketDataRepository, MarketEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, info, warn};

/// Maximum retry attempts
const MAX_RETRIES: usize = 3;

/// Events requested per page
const PAGE_SIZE: usize = 500;

/// Upper bound on pages followed for one request
const MAX_PAGES: usize = 200;

/// One page of the upstream events endpoint.
#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    events: Vec<MarketEvent>,
    #[serde(default)]
    continuation: Option<String>,
}

/// Marketplace events API client
#[derive(Clone)]
pub struct MarketplaceClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl MarketplaceClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("NftAnalyticsGateway/1.0")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Events endpoint of `collection`.
    fn events_url(&self, collection: &CollectionConfig) -> String {
        format!(
            "{}/v1/collections/{}/events",
            self.base_url,
            collection.upstream_id()
        )
    }

    /// Query parameters of one events page, percent-encoded by reqwest.
    fn events_query(
        since: Option<DateTime<Utc>>,
        continuation: Option<&str>,
    ) -> Vec<(&'static str, String)> {
        let mut query = vec![("limit", PAGE_SIZE.to_string())];
        if let Some(since) = since {
            query.push(("since", since.timestamp_millis().to_string()));
        }
        if let Some(cursor) = continuation {
            query.push(("continuation", cursor.to_string()));
        }
        query
    }

    fn events_request(&self, url: &str, query: &[(&'static str, String)]) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json");
        match &self.api_key {
            Some(key) => request.header("X-API-KEY", key),
            None => request,
        }
    }

    async fn get_page(&self, url: &str, query: &[(&'static str, String)]) -> Result<EventsPage> {
        debug!("Fetching from marketplace API: {} {:?}", url, query);

        // 100ms, 200ms, 400ms before jitter
        let retry_strategy = ExponentialBackoff::from_millis(2)
            .factor(50)
            .map(jitter)
            .take(MAX_RETRIES);

        let response = Retry::spawn(retry_strategy, || async {
            self.events_request(url, query).send().await
        })
        .await
        .with_context(|| format!("Failed to fetch from {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Marketplace request failed with status {}: {}",
                status,
                error_body
            );
        }

        response
            .json::<EventsPage>()
            .await
            .with_context(|| format!("Failed to parse events page from {}", url))
    }
}

#[async_trait]
impl MarketDataRepository for MarketplaceClient {
    async fn fetch_events(
        &self,
        collection: &CollectionConfig,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<MarketEvent>> {
        let url = self.events_url(collection);
        let mut events = Vec::new();
        let mut continuation: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let query = Self::events_query(since, continuation.as_deref());
            let page = self.get_page(&url, &query).await?;
            events.extend(page.events);

            match page.continuation {
                Some(next) if !next.is_empty() => continuation = Some(next),
                _ => {
                    info!("Fetched {} events for {}", events.len(), collection.slug);
                    return Ok(events);
                }
            }
        }

        warn!(
            "Stopped after {} pages for {}; returning {} events",
            MAX_PAGES,
            collection.slug,
            events.len()
        );
        Ok(events)
    }
}
