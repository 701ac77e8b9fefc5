use crate::domain::CacheRepository;
use anyhow::Context;
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Pool, Runtime};
use tracing::{error, info};

/// Redis-backed response cache.
///
/// Without a pool every lookup misses and every write is dropped, so the
/// gateway keeps serving when `REDIS_URL` is unset or invalid.
pub struct RedisRepository {
    pool: Option<Pool>,
}

impl RedisRepository {
    pub fn new(url: Option<String>) -> Self {
        let Some(redis_url) = url else {
            info!("Redis URL not provided, caching disabled");
            return Self { pool: None };
        };

        match Config::from_url(&redis_url).create_pool(Some(Runtime::Tokio1)) {
            Ok(pool) => {
                info!("Redis connection pool initialized");
                Self { pool: Some(pool) }
            }
            Err(e) => {
                error!("Failed to create Redis connection pool: {}", e);
                Self { pool: None }
            }
        }
    }

}

#[async_trait]
impl CacheRepository for RedisRepository {
    fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let Some(pool) = &self.pool else {
            return Ok(None);
        };
        let mut conn = pool
            .get()
            .await
            .context("Failed to get Redis connection from pool")?;
        let value: Option<String> = conn
            .get(key)
            .await
            .with_context(|| format!("Redis GET {} failed", key))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<()> {
        let Some(pool) = &self.pool else {
            return Ok(());
        };
        // SETEX rejects a zero expiry
        if ttl_seconds == 0 {
            return Ok(());
        }
        let mut conn = pool
            .get()
            .await
            .context("Failed to get Redis connection from pool")?;
        let _: () = conn
            .set_ex(key, value, ttl_seconds)
            .await
            .with_context(|| format!("Redis SETEX {} failed", key))?;
        Ok(())
    }
}
