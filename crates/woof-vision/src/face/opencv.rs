//! OpenCV `CascadeClassifier` backend.

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use opencv::core::{Mat, Rect, Size, Vector};
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use tracing::{debug, info};

use super::{FaceRect, MIN_NEIGHBORS, SCALE_FACTOR};
use crate::detector::FaceDetector;
use crate::error::{VisionError, VisionResult};
use crate::tensor::to_grayscale;

impl From<Rect> for FaceRect {
    fn from(r: Rect) -> Self {
        Self {
            x: r.x.max(0) as u32,
            y: r.y.max(0) as u32,
            width: r.width.max(0) as u32,
            height: r.height.max(0) as u32,
        }
    }
}

/// Face detector backed by an OpenCV Haar cascade.
pub struct OpenCvFaceDetector {
    // detectMultiScale takes &mut self.
    classifier: Mutex<CascadeClassifier>,
}

impl OpenCvFaceDetector {
    /// Load a cascade XML file (e.g. `haarcascade_frontalface_alt.xml`).
    pub fn load(path: &Path) -> VisionResult<Self> {
        if !path.exists() {
            return Err(VisionError::ModelNotFound(path.to_path_buf()));
        }
        let classifier = CascadeClassifier::new(&path.to_string_lossy())
            .map_err(|e| VisionError::model_load(path, e.to_string()))?;
        if classifier
            .empty()
            .map_err(|e| VisionError::model_load(path, e.to_string()))?
        {
            return Err(VisionError::model_load(path, "OpenCV loaded an empty cascade"));
        }
        info!(path = %path.display(), "Face cascade loaded");
        Ok(Self {
            classifier: Mutex::new(classifier),
        })
    }
}

impl FaceDetector for OpenCvFaceDetector {
    fn detect_faces(&self, image: &DynamicImage) -> VisionResult<Vec<FaceRect>> {
        let gray = to_grayscale(image);
        let mat = Mat::new_rows_cols_with_data(gray.height() as i32, gray.width() as i32, gray.as_raw())
            .map_err(|e| VisionError::inference(format!("OpenCV Mat: {e}")))?;

        let mut classifier = self
            .classifier
            .lock()
            .map_err(|_| VisionError::internal("Cascade lock poisoned"))?;

        let mut found = Vector::<Rect>::new();
        classifier
            .detect_multi_scale(
                &*mat,
                &mut found,
                SCALE_FACTOR,
                MIN_NEIGHBORS,
                0,
                Size::default(),
                Size::default(),
            )
            .map_err(|e| VisionError::inference(format!("detectMultiScale: {e}")))?;

        let faces: Vec<FaceRect> = found.iter().map(FaceRect::from).collect();
        debug!(
            width = gray.width(),
            height = gray.height(),
            faces = faces.len(),
            "Face detection completed"
        );
        Ok(faces)
    }
}
