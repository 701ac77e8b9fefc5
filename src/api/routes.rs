use crate::api::analytics_handlers::{
    collections_handler, leaderboard_handler, metric_series_handler,
};
use crate::api::doc::ApiDoc;
use crate::api::handlers::{health_handler, metrics_handler};
use crate::api::state::AppState;
use axum::http::{HeaderValue, Request, Response, StatusCode};
use axum::{routing::get, Router};

use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{Level, Span};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Requests slower than this are logged at `warn`.
const SLOW_REQUEST_MS: u128 = 1000;

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    if allowed_origins == "*" {
        return CorsLayer::permissive();
    }

    let origin_values: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    match origin_values.len() {
        0 => {
            tracing::warn!("No valid CORS origins found, falling back to permissive CORS");
            CorsLayer::permissive()
        }
        1 => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin_values[0].clone()))
            .allow_methods(Any)
            .allow_headers(Any),
        _ => CorsLayer::new()
            .allow_origin(AllowOrigin::list(origin_values))
            .allow_methods(Any)
            .allow_headers(Any),
    }
}

pub fn create_router(state: AppState, allowed_origins: &str) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::span!(
                        Level::INFO,
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = ?request.headers().get("x-request-id")
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, _span: &Span| {
                    let status = response.status().as_u16();
                    metrics::counter!(
                        "http_requests_total",
                        "status" => status.to_string(),
                        "status_class" => format!("{}xx", status / 100)
                    )
                    .increment(1);
                    metrics::histogram!("http_request_duration_seconds", "status" => status.to_string())
                        .record(latency.as_secs_f64());

                    if latency.as_millis() > SLOW_REQUEST_MS {
                        tracing::warn!("Slow HTTP request: {}ms", latency.as_millis());
                    }
                })
                .on_failure(|error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                    tracing::error!("Request failed: {}", error);
                }),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(60),
        ))
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(cors_layer(allowed_origins));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // System endpoints (no versioning)
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // Collection analytics
        .route("/v1/collections", get(collections_handler))
        .route("/v1/collections/leaderboard", get(leaderboard_handler))
        .route("/v1/collections/{slug}/{metric}", get(metric_series_handler))
        .layer(middleware)
        .with_state(state)
}
