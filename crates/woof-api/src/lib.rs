//! Web front end for the dog breed classifier.
//!
//! This crate provides:
//! - Upload form, uploaded images page and predictions page
//! - Per-browser upload batches behind a signed session cookie
//! - Rate limiting and security headers
//! - Prometheus metrics
//! - A janitor task that expires idle sessions and their files

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod views;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::UploadJanitor;
pub use state::AppState;
