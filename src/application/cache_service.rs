//! Response cache keyed by normalized request signatures.
//!
//! Final JSON bodies are cached with a fixed TTL per endpoint family. The key
//! is the request path plus its query parameters sorted by name, with the
//! `cache` bypass flag removed so `?cache=false` refreshes the same entry that
//! regular requests read.

use crate::domain::CacheRepository;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// TTL configurations per endpoint family, in minutes
pub mod ttl {
    /// Metric series - 12 hours
    pub const SERIES_MINUTES: u64 = 720;

    /// Collection leaderboard - 24 hours
    pub const LEADERBOARD_MINUTES: u64 = 1440;

    /// Configured collection list - 15 days
    pub const COLLECTIONS_MINUTES: u64 = 21600;

    pub const fn to_secs(minutes: u64) -> u64 {
        minutes * 60
    }
}

/// Query parameter that skips the cache read when set to `false`.
pub const BYPASS_PARAM: &str = "cache";

/// Thin get/set wrapper over a [`CacheRepository`].
pub struct CacheService {
    repo: Arc<dyn CacheRepository>,
}

impl CacheService {
    pub fn new(repo: Arc<dyn CacheRepository>) -> Self {
        Self { repo }
    }

    /// Build the cache key for a request.
    ///
    /// `/v1/collections/apes/sales?time=7d&cache=false` and
    /// `/v1/collections/apes/sales?time=7d` map to the same key.
    pub fn request_signature(path: &str, params: &[(String, String)]) -> String {
        let mut kept: Vec<&(String, String)> = params
            .iter()
            .filter(|(name, _)| name != BYPASS_PARAM)
            .collect();
        kept.sort();

        if kept.is_empty() {
            return format!("v1:{}", path);
        }
        let query = kept
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("&");
        format!("v1:{}?{}", path, query)
    }

    /// Read and deserialize a cached body. Cache errors count as misses.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cached = match self.repo.get(key).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        };

        match cached.map(|body| serde_json::from_str::<T>(&body)) {
            Some(Ok(value)) => {
                debug!("Cache hit: {}", key);
                metrics::counter!("cache_requests_total", "result" => "hit").increment(1);
                Some(value)
            }
            Some(Err(e)) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                self.record_miss();
                None
            }
            None => {
                self.record_miss();
                None
            }
        }
    }

    /// Serialize and store a body. Failures are logged, never returned.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_minutes: u64) {
        match serde_json::to_string(value) {
            Ok(body) => {
                if let Err(e) = self.repo.set(key, &body, ttl::to_secs(ttl_minutes)).await {
                    warn!("Failed to write cache entry {}: {}", key, e);
                }
            }
            Err(e) => warn!("Failed to serialize cache entry {}: {}", key, e),
        }
    }

    /// Return the cached body for `key`, or compute, store and return it.
    ///
    /// With `bypass` the read is skipped but the fresh result is still stored.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        ttl_minutes: u64,
        bypass: bool,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !bypass {
            if let Some(cached) = self.get_json::<T>(key).await {
                return Ok(cached);
            }
        } else {
            debug!("Cache bypass requested: {}", key);
        }

        let value = compute().await?;
        self.set_json(key, &value, ttl_minutes).await;
        Ok(value)
    }

    /// Whether the backing store answers a lookup.
    pub async fn is_healthy(&self) -> bool {
        self.repo.get("_health_check").await.is_ok()
    }

    /// Whether a backing store is configured at all.
    pub fn is_enabled(&self) -> bool {
        self.repo.is_enabled()
    }

    fn record_miss(&self) {
        metrics::counter!("cache_requests_total", "result" => "miss").increment(1);
    }
}
