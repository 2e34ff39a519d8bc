//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;

use crate::handlers::detect::IMAGES_ROUTE;
use crate::handlers::{health, not_found, ready, submit, upload};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, limit_detection_requests, security_headers, trace_request, ClientRateLimiter,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = Arc::new(ClientRateLimiter::new(
        state.config.rate_limit_rps,
        state.config.rate_limit_burst,
    ));

    // Detection is the only expensive surface
    let detect_routes = Router::new()
        .route("/upload", post(upload))
        .route("/submit", post(submit))
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            limit_detection_requests,
        ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    let images = ServeDir::new(state.orchestrator.output_dir());

    Router::new()
        .merge(detect_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .nest_service(IMAGES_ROUTE, images)
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(trace_request))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
