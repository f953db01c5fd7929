//! Shared data models for the Woof backend.
//!
//! This crate provides Serde-serializable types for:
//! - Upload batches and stored images
//! - Classification verdicts and per-image predictions

pub mod batch;
pub mod prediction;
pub mod upload;

// Re-export common types
pub use batch::{BatchId, BatchIdError};
pub use prediction::{Prediction, Verdict};
pub use upload::{image_url, UploadedImage};
