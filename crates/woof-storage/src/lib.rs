//! Local storage for uploaded images.
//!
//! This crate provides:
//! - Per-session batch directories
//! - Safe, collision-free stored file names that preserve upload order
//! - Batch purging (on demand, at startup and after expiry)

pub mod error;
pub mod names;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use names::{is_image_name, sanitize_file_name, IMAGE_EXTENSIONS};
pub use store::{check_upload, UploadStore, DEFAULT_UPLOAD_DIR};
