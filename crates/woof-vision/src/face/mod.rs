//! Human face detection.
//!
//! Detection runs OpenCV's `CascadeClassifier` over a frontal face Haar
//! cascade. Builds without the `opencv` feature have no face detector and
//! `Classifier::load` refuses to start.

#[cfg(feature = "opencv")]
mod opencv;

#[cfg(feature = "opencv")]
pub use self::opencv::OpenCvFaceDetector;

/// `detectMultiScale` scale step.
pub const SCALE_FACTOR: f64 = 1.1;

/// `detectMultiScale` minimum neighbours per grouped detection.
pub const MIN_NEIGHBORS: i32 = 3;

/// Detected region in source image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}
