//! Stored upload metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::BatchId;

/// An image persisted in a batch directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub batch_id: BatchId,
    /// Stored file name (sequence prefix + sanitized original name)
    pub file_name: String,
    /// Name the browser sent
    pub original_name: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadedImage {
    /// Relative URL the image is served under.
    pub fn url(&self) -> String {
        image_url(&self.batch_id, &self.file_name)
    }
}

/// Build the public URL of a stored file.
pub fn image_url(batch_id: &BatchId, file_name: &str) -> String {
    format!("/uploads/{}/{}", batch_id, file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_layout() {
        let batch_id = BatchId::parse("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let image = UploadedImage {
            batch_id,
            file_name: "000001-rex.jpg".to_string(),
            original_name: "rex.jpg".to_string(),
            size_bytes: 10,
            uploaded_at: Utc::now(),
        };
        assert_eq!(
            image.url(),
            "/uploads/67e55044-10b1-426f-9247-bb680e5fe0c8/000001-rex.jpg"
        );
    }
}
