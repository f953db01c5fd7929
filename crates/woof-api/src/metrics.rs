//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "woof_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "woof_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "woof_http_requests_in_flight";

    // Upload metrics
    pub const UPLOADS_TOTAL: &str = "woof_uploads_total";
    pub const UPLOAD_BYTES_TOTAL: &str = "woof_upload_bytes_total";
    pub const UPLOADS_REJECTED_TOTAL: &str = "woof_uploads_rejected_total";
    pub const BATCHES_PURGED_TOTAL: &str = "woof_batches_purged_total";
    pub const ACTIVE_SESSIONS: &str = "woof_active_sessions";

    // Prediction metrics
    pub const PREDICTIONS_TOTAL: &str = "woof_predictions_total";
    pub const PREDICTION_BATCH_DURATION_SECONDS: &str = "woof_prediction_batch_duration_seconds";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "woof_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an accepted upload.
pub fn record_upload(size_bytes: u64) {
    counter!(names::UPLOADS_TOTAL).increment(1);
    counter!(names::UPLOAD_BYTES_TOTAL).increment(size_bytes);
}

/// Record a rejected upload.
pub fn record_upload_rejected(reason: &'static str) {
    counter!(names::UPLOADS_REJECTED_TOTAL, "reason" => reason).increment(1);
}

/// Record purged batches.
pub fn record_batches_purged(trigger: &'static str, count: usize) {
    counter!(names::BATCHES_PURGED_TOTAL, "trigger" => trigger).increment(count as u64);
}

/// Update the active sessions gauge.
pub fn set_active_sessions(count: usize) {
    gauge!(names::ACTIVE_SESSIONS).set(count as f64);
}

/// Record one prediction.
pub fn record_prediction(verdict: &'static str) {
    counter!(names::PREDICTIONS_TOTAL, "verdict" => verdict).increment(1);
}

/// Record how long a whole batch took to classify.
pub fn record_prediction_batch(duration_secs: f64) {
    histogram!(names::PREDICTION_BATCH_DURATION_SECONDS).record(duration_secs);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});

static UPLOAD_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/uploads/[^/]+/[^/]+$").unwrap());

/// Sanitize path for metrics labels (remove IDs, file names).
pub fn sanitize_path(path: &str) -> String {
    if UPLOAD_FILE_RE.is_match(path) {
        return "/uploads/:batch/:file".to_string();
    }
    UUID_RE.replace_all(path, ":id").to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
