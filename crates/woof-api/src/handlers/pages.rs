//! Upload form, upload endpoint and the uploaded images page.

use axum::body::Bytes;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Extension;
use tracing::{info, warn};
use woof_models::UploadedImage;
use woof_storage::{check_upload, is_image_name};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::session::Session;
use crate::state::AppState;
use crate::views;

/// Body returned for every accepted upload request.
pub const UPLOAD_ACK: &str = "uploading...";

/// GET / : start over. Drops the caller's uploads and URL list.
pub async fn index(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Html<String>> {
    state.sessions.take_urls(&session.batch_id).await;
    let purged = state.uploads.purge(&session.batch_id).await?;
    if purged > 0 {
        metrics::record_batches_purged("index", 1);
        info!(batch_id = %session.batch_id, files = purged, "Cleared previous uploads");
    }
    Ok(Html(views::index_page()))
}

/// POST / : store uploaded images in the caller's batch.
///
/// Every file field is accepted regardless of its name. The request is all
/// or nothing: every field is checked before the first file is written, and
/// files already written are removed again if a later write fails.
pub async fn upload(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, &'static str)> {
    let mut files: Vec<(String, Bytes)> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if file_name.is_empty() {
            continue;
        }

        if let Err(e) = check_image_field(&field, &file_name) {
            metrics::record_upload_rejected("type");
            warn!(batch_id = %session.batch_id, file = %file_name, "Rejected non-image upload");
            return Err(e);
        }

        let bytes = field.bytes().await.map_err(multipart_error)?;
        if let Err(e) = check_upload(&file_name, &bytes) {
            metrics::record_upload_rejected("content");
            warn!(batch_id = %session.batch_id, file = %file_name, "Rejected upload: {}", e);
            return Err(e.into());
        }
        files.push((file_name, bytes));
    }

    if files.is_empty() {
        metrics::record_upload_rejected("empty");
        return Err(ApiError::bad_request("no files in upload"));
    }

    let mut saved: Vec<UploadedImage> = Vec::with_capacity(files.len());
    for (file_name, bytes) in &files {
        match state.uploads.save(&session.batch_id, file_name, bytes).await {
            Ok(image) => saved.push(image),
            Err(e) => {
                warn!(
                    batch_id = %session.batch_id,
                    file = %file_name,
                    rolled_back = saved.len(),
                    "Upload failed: {}",
                    e
                );
                for image in &saved {
                    if let Err(e) = state.uploads.remove(&session.batch_id, &image.file_name).await {
                        warn!(file = %image.file_name, "Failed to remove partial upload: {}", e);
                    }
                }
                return Err(e.into());
            }
        }
    }

    for image in &saved {
        metrics::record_upload(image.size_bytes);
        info!(
            batch_id = %session.batch_id,
            file = %image.file_name,
            size = image.size_bytes,
            "Image uploaded"
        );
    }
    state
        .sessions
        .extend_urls(&session.batch_id, saved.iter().map(UploadedImage::url))
        .await;

    Ok((StatusCode::OK, UPLOAD_ACK))
}

/// GET /results : show the uploaded images, or go back to the form.
pub async fn results(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Response {
    let urls = state.sessions.urls(&session.batch_id).await;
    if urls.is_empty() {
        return Redirect::to("/").into_response();
    }
    Html(views::results_page(&urls)).into_response()
}

/// Content type must be an image type, and the name must carry an image extension.
fn check_image_field(field: &Field<'_>, file_name: &str) -> ApiResult<()> {
    let content_type = field.content_type().unwrap_or("application/octet-stream");
    let generic = content_type == "application/octet-stream";
    if !generic && !content_type.starts_with("image/") {
        return Err(ApiError::bad_request(format!(
            "{} is not an image ({})",
            file_name, content_type
        )));
    }
    if !is_image_name(file_name) {
        return Err(ApiError::bad_request(format!(
            "{} does not have an image file extension",
            file_name
        )));
    }
    Ok(())
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::bad_request(format!("invalid multipart body: {}", e.body_text()))
    }
}
