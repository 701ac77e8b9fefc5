use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::health_handler,
        crate::api::handlers::metrics_handler,
        crate::api::analytics_handlers::collections_handler,
        crate::api::analytics_handlers::leaderboard_handler,
        crate::api::analytics_handlers::metric_series_handler
    ),
    components(
        schemas(
            crate::api::handlers::HealthResponse,
            crate::api::handlers::HealthDependencies,
            crate::api::analytics_handlers::ErrorResponse,
            crate::domain::Granularity,
            crate::domain::Metric,
            crate::domain::CollectionConfig,
            crate::domain::CollectionsResponse,
            crate::domain::LeaderboardEntry,
            crate::domain::LeaderboardResponse,
            crate::domain::SeriesResponse
        )
    ),
    tags(
        (name = "system", description = "System endpoints for health checks and metrics"),
        (name = "collections", description = "Time-bucketed NFT collection analytics")
    ),
    info(
        title = "NFT Analytics Gateway",
        version = "0.1.0",
        description = "REST API serving gap-free, time-bucketed analytics (sales, transfers, mints, floor price, market cap) for NFT collections, with Redis response caching and Prometheus metrics."
    )
)]
pub struct ApiDoc;
