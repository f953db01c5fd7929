//! Serving stored images.

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use woof_models::BatchId;

use crate::error::{ApiError, ApiResult};
use crate::session::Session;
use crate::state::AppState;

/// GET /uploads/:batch/:file : only the owning session may fetch its images.
pub async fn serve_upload(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((batch, file)): Path<(String, String)>,
    request: Request,
) -> ApiResult<Response> {
    let batch_id = BatchId::parse(&batch).map_err(|_| ApiError::not_found("image"))?;
    if batch_id != session.batch_id {
        return Err(ApiError::not_found("image"));
    }
    let path = state
        .uploads
        .file_path(&batch_id, &file)
        .map_err(|_| ApiError::not_found("image"))?;

    let response = ServeFile::new(path)
        .oneshot(request)
        .await
        .map_err(|e| ApiError::internal(format!("failed to serve image: {}", e)))?;
    Ok(response.map(Body::new).into_response())
}
