//! Error types for vision operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for vision operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors that can occur while loading models or classifying images.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Model not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Failed to load model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected model output shape: {0}")]
    OutputShape(String),

    #[error("Invalid breed table: {0}")]
    BreedTable(String),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VisionError {
    /// Create a model load failure error.
    pub fn model_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an inference failure error.
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error is caused by the input image rather than the models.
    pub fn is_bad_input(&self) -> bool {
        matches!(self, VisionError::ImageDecode(_))
    }
}
