//! Background services.

pub mod janitor;

pub use janitor::UploadJanitor;
