//! Seams between the orchestration pipeline and the concrete models.
//!
//! Every detector works on an already decoded image so the pipeline reads
//! each upload from disk once.

use image::DynamicImage;

use crate::face::FaceRect;
use crate::error::VisionResult;

/// Human face detection.
pub trait FaceDetector: Send + Sync {
    /// Face regions found in the image.
    fn detect_faces(&self, image: &DynamicImage) -> VisionResult<Vec<FaceRect>>;

    /// True when at least one face was found.
    fn contains_face(&self, image: &DynamicImage) -> VisionResult<bool> {
        Ok(!self.detect_faces(image)?.is_empty())
    }
}

/// "Is there a dog in this picture" check.
pub trait DogDetector: Send + Sync {
    fn contains_dog(&self, image: &DynamicImage) -> VisionResult<bool>;
}

/// Closest dog breed for an image.
pub trait BreedPredictor: Send + Sync {
    fn predict_breed(&self, image: &DynamicImage) -> VisionResult<String>;
}
