//! Upload batch identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when a string is not a valid batch ID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid batch id: {0}")]
pub struct BatchIdError(pub String);

/// Identifier of one browser session's upload batch.
///
/// Batch IDs double as directory names under the upload root, so only
/// canonical hyphenated UUIDs are accepted when parsing untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    /// Generate a new random batch ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse an untrusted string (cookie value, directory name).
    pub fn parse(s: &str) -> Result<Self, BatchIdError> {
        match Uuid::try_parse(s) {
            Ok(uuid) if uuid.hyphenated().to_string() == s => Ok(Self(s.to_string())),
            _ => Err(BatchIdError(s.to_string())),
        }
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for BatchId {
    type Error = BatchIdError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}
