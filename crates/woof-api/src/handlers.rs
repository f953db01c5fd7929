//! Request handlers.

pub mod health;
pub mod pages;
pub mod predictions;
pub mod uploads;

pub use health::*;
pub use pages::*;
pub use predictions::*;
pub use uploads::*;
