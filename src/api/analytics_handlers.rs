//! HTTP handlers for collection analytics endpoints.
//!
//! Handlers translate the `time` query parameter into a window, build the
//! cache signature from the request and map [`AnalyticsError`] onto status
//! codes.

use crate::api::state::AppState;
use crate::application::{AnalyticsError, CacheService};
use crate::domain::{CollectionsResponse, LeaderboardResponse, Metric, SeriesResponse};
use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Query parameters shared by the analytics endpoints
#[derive(Debug, Clone, Default, Deserialize, IntoParams, Validate)]
pub struct WindowQuery {
    /// Time window: 24h, 7d, 30d, 3m, 1y or all (default: all)
    #[param(example = "7d")]
    #[validate(length(min = 1, max = 10))]
    pub time: Option<String>,
    /// Set to false to skip the cached response and refresh it
    #[param(example = false)]
    pub cache: Option<bool>,
}

impl WindowQuery {
    fn bypass_cache(&self) -> bool {
        self.cache == Some(false)
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn validated(query: &WindowQuery) -> Result<(), ApiError> {
    query.validate().map_err(|validation_errors| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Validation failed".to_string(),
                details: Some(format!("{:?}", validation_errors)),
            }),
        )
    })
}

fn error_response(err: AnalyticsError) -> ApiError {
    let (status, error) = match &err {
        AnalyticsError::UnknownCollection(_) => (StatusCode::NOT_FOUND, "Collection not found"),
        AnalyticsError::MissingSupply(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "Market cap unavailable for this collection",
        ),
        AnalyticsError::Series(e) => {
            error!("Series data format error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Series data format error")
        }
        AnalyticsError::Upstream(e) => {
            warn!("Upstream marketplace failure: {:#}", e);
            (StatusCode::BAD_GATEWAY, "Failed to fetch marketplace data")
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            details: Some(err.to_string()),
        }),
    )
}

/// List configured collections
#[utoipa::path(
    get,
    path = "/v1/collections",
    params(WindowQuery),
    responses(
        (status = 200, description = "Configured collections", body = CollectionsResponse)
    ),
    tag = "collections"
)]
pub async fn collections_handler(
    uri: Uri,
    Query(query): Query<WindowQuery>,
    Query(params): Query<Vec<(String, String)>>,
    State(state): State<AppState>,
) -> Result<Json<CollectionsResponse>, ApiError> {
    metrics::counter!("api_requests_total", "endpoint" => "collections").increment(1);
    let key = CacheService::request_signature(uri.path(), &params);

    state
        .analytics_service
        .list_collections(&key, query.bypass_cache())
        .await
        .map(Json)
        .map_err(error_response)
}

/// Rank collections by sales volume
#[utoipa::path(
    get,
    path = "/v1/collections/leaderboard",
    params(WindowQuery),
    responses(
        (status = 200, description = "Collections ordered by sales volume", body = LeaderboardResponse),
        (status = 400, description = "Invalid input parameters", body = ErrorResponse)
    ),
    description = "Sales count, volume and floor price of every configured collection within the window, highest volume first. Collections whose data cannot be fetched are omitted.",
    tag = "collections"
)]
pub async fn leaderboard_handler(
    uri: Uri,
    Query(query): Query<WindowQuery>,
    Query(params): Query<Vec<(String, String)>>,
    State(state): State<AppState>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    validated(&query)?;
    metrics::counter!("api_requests_total", "endpoint" => "leaderboard").increment(1);
    let key = CacheService::request_signature(uri.path(), &params);

    state
        .analytics_service
        .leaderboard(query.time.as_deref(), &key, query.bypass_cache())
        .await
        .map(Json)
        .map_err(error_response)
}

/// Dense time series of one metric for a collection
#[utoipa::path(
    get,
    path = "/v1/collections/{slug}/{metric}",
    params(
        ("slug" = String, Path, description = "Collection slug", example = "azuki"),
        ("metric" = Metric, Path, description = "sales, transfers, mints, floor-price or market-cap"),
        WindowQuery
    ),
    responses(
        (status = 200, description = "Gap-free series at the window's granularity", body = SeriesResponse),
        (status = 400, description = "Invalid input parameters", body = ErrorResponse),
        (status = 404, description = "Unknown collection", body = ErrorResponse),
        (status = 422, description = "Market cap requested for a collection without supply", body = ErrorResponse),
        (status = 500, description = "Series data format error", body = ErrorResponse),
        (status = 502, description = "Upstream marketplace failure", body = ErrorResponse)
    ),
    description = "Buckets are hourly for 24h, two-hourly for 7d and daily otherwise. Missing buckets are zero-filled for counters and carried forward for floor price and market cap.",
    tag = "collections"
)]
pub async fn metric_series_handler(
    uri: Uri,
    Path((slug, metric)): Path<(String, Metric)>,
    Query(query): Query<WindowQuery>,
    Query(params): Query<Vec<(String, String)>>,
    State(state): State<AppState>,
) -> Result<Json<SeriesResponse>, ApiError> {
    validated(&query)?;
    metrics::counter!("api_requests_total", "endpoint" => "series", "metric" => metric.as_str())
        .increment(1);
    let key = CacheService::request_signature(uri.path(), &params);

    state
        .analytics_service
        .metric_series(
            &slug,
            metric,
            query.time.as_deref(),
            &key,
            query.bypass_cache(),
        )
        .await
        .map(Json)
        .map_err(error_response)
}
