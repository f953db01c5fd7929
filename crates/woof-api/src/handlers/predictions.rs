//! Prediction pages.

use std::time::Instant;

use axum::extract::State;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use serde::Serialize;
use tracing::{info, warn};
use woof_models::{BatchId, Prediction};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::session::Session;
use crate::state::AppState;
use crate::views;

/// JSON body of `/api/predictions`.
#[derive(Debug, Serialize)]
pub struct PredictionsResponse {
    pub predictions: Vec<Prediction>,
}

/// GET /predictions : classify the caller's batch and render the results.
pub async fn predictions(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Response> {
    let predictions = predict_batch(&state, &session.batch_id).await?;
    if predictions.is_empty() {
        return Ok(Redirect::to("/").into_response());
    }
    Ok(Html(views::predictions_page(&predictions)).into_response())
}

/// GET /api/predictions : same as `/predictions`, as JSON.
pub async fn api_predictions(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<PredictionsResponse>> {
    let predictions = predict_batch(&state, &session.batch_id).await?;
    Ok(Json(PredictionsResponse { predictions }))
}

/// Classify every stored image of a batch, in upload order, and clear the
/// session's URL list.
pub async fn predict_batch(state: &AppState, batch_id: &BatchId) -> ApiResult<Vec<Prediction>> {
    let session_urls = state.sessions.take_urls(batch_id).await;
    let images = state.uploads.list(batch_id).await?;
    if images.is_empty() {
        return Ok(Vec::new());
    }

    let urls: Vec<String> = images.iter().map(|image| image.url()).collect();
    if urls != session_urls {
        warn!(
            batch_id = %batch_id,
            stored = urls.len(),
            listed = session_urls.len(),
            "Session URL list does not match stored files, using stored files"
        );
    }

    let dir = state.uploads.batch_dir(batch_id);
    let paths: Vec<_> = images.iter().map(|image| dir.join(&image.file_name)).collect();
    let classifier = state.classifier.clone();
    let started = Instant::now();
    let verdicts = tokio::task::spawn_blocking(move || classifier.classify_paths(&paths))
        .await
        .map_err(|e| ApiError::internal(format!("classification task failed: {}", e)))?;
    let elapsed = started.elapsed();
    metrics::record_prediction_batch(elapsed.as_secs_f64());

    let predictions: Vec<Prediction> = urls
        .into_iter()
        .zip(verdicts)
        .map(|(url, verdict)| {
            metrics::record_prediction(verdict.as_str());
            Prediction::new(url, verdict)
        })
        .collect();

    info!(
        batch_id = %batch_id,
        images = predictions.len(),
        duration_ms = elapsed.as_millis() as u64,
        "Batch classified"
    );

    Ok(predictions)
}
