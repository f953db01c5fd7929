//! HTTP routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{api_predictions, health, index, predictions, ready, results, serve_upload, upload};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, rate_limit_middleware, request_id, request_logging, security_headers, RateLimiterCache};
use crate::session::session_middleware;
use crate::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = Arc::new(RateLimiterCache::new(
        state.config.rate_limit_rps,
        state.config.rate_limit_burst,
    ));

    // Uploading and classifying are the expensive paths.
    let limited_routes = Router::new()
        .route("/", get(index).post(upload))
        .route("/predictions", get(predictions))
        .route("/api/predictions", get(api_predictions))
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let page_routes = Router::new()
        .merge(limited_routes)
        .route("/results", get(results))
        .route("/uploads/:batch/:file", get(serve_upload))
        .layer(middleware::from_fn_with_state(state.clone(), session_middleware));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(page_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Multipart extraction has its own, smaller default limit.
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
