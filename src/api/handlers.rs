use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub collections: usize,
    pub dependencies: HealthDependencies,
}

#[derive(Serialize, ToSchema)]
pub struct HealthDependencies {
    pub redis: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Health check passed", body = HealthResponse),
        (status = 503, description = "Service degraded or unavailable", body = HealthResponse)
    )
)]
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let service = &state.analytics_service;
    let redis_status = if !service.cache_enabled() {
        "disabled"
    } else if service.check_cache_health().await {
        "healthy"
    } else {
        "unavailable"
    };
    let healthy = redis_status != "unavailable";
    let overall_status = if healthy { "ok" } else { "degraded" };

    let response = HealthResponse {
        status: overall_status.to_string(),
        version: VERSION.to_string(),
        collections: state.analytics_service.collections().len(),
        dependencies: HealthDependencies {
            redis: redis_status.to_string(),
        },
    };

    if healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "system",
    responses(
        (status = 200, description = "Prometheus metrics", content_type = "text/plain")
    )
)]
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics_handle {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}
