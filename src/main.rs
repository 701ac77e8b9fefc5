//! NFT Analytics Gateway
//!
//! REST API serving gap-free, time-bucketed analytics for NFT collections:
//! sales, transfers, mints, floor price and market cap over symbolic windows
//! (`24h`, `7d`, `30d`, `3m`, `1y`, `all`).
//!
//! # Architecture
//!
//! - **Domain**: window resolution, bucket keys, series densification, DTOs
//! - **Application**: aggregation of raw events, caching, orchestration
//! - **Infrastructure**: upstream marketplace client, Redis cache
//! - **API**: HTTP handlers, routing, middleware and OpenAPI docs
//!
//! # Configuration
//!
//! `config.yaml` (path overridable with `CONFIG_PATH`) plus environment:
//! - `REDIS_URL`: Redis connection string (caching disabled when unset)
//! - `MARKETPLACE_API_URL` / `MARKETPLACE_API_KEY`: upstream events API
//! - `PORT`: listen port override
//! - `RUST_LOG`: logging level (default: info)
//! - `LOG_FORMAT`: `json` for structured logs
//!
//! # Quick Start
//!
//! ```bash
//! export REDIS_URL="redis://localhost:6379"
//! cargo run --release
//!
//! curl http://localhost:3010/health
//! curl "http://localhost:3010/v1/collections/azuki/sales?time=7d"
//! ```

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use nft_analytics_gateway::api::{create_router, AppState};
use nft_analytics_gateway::application::{AnalyticsService, CacheService};
use nft_analytics_gateway::config::AppConfig;
use nft_analytics_gateway::infrastructure::{MarketplaceClient, RedisRepository};
use std::env;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = EnvFilter::new(env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
    let config = AppConfig::load(&config_path)?;
    tracing::info!("Loaded configuration from {}: {:?}", config_path, config);

    // Installed once; handlers only render
    let metrics_handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Failed to install Prometheus recorder, /metrics disabled: {}", e);
            None
        }
    };

    // Infrastructure
    let redis_repo = Arc::new(RedisRepository::new(config.redis_url.clone()));
    let marketplace = Arc::new(MarketplaceClient::new(&config.upstream)?);
    if config.upstream.api_key.is_none() {
        tracing::warn!("MARKETPLACE_API_KEY not set - upstream requests are unauthenticated");
    }

    // Application
    let cache_service = Arc::new(CacheService::new(redis_repo));
    let analytics_service = Arc::new(AnalyticsService::new(
        marketplace,
        cache_service,
        config.collections.clone(),
    ));

    let state = AppState {
        analytics_service,
        metrics_handle,
    };
    let app = create_router(state, &config.server.allowed_origins);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", addr))?;
    tracing::info!("NFT analytics gateway running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error during operation")?;

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C) to initiate graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
