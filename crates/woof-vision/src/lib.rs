//! Face, dog and breed inference.
//!
//! This crate provides:
//! - Haar cascade face detection through OpenCV
//! - ResNet50 dog detection over ONNX Runtime
//! - Xception bottleneck + trained head breed prediction
//! - The human / dog / unknown decision procedure

pub mod breeds;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod face;
pub mod onnx;
pub mod pipeline;
pub mod tensor;

pub use breeds::BreedNames;
pub use classifier::{ResNetDogDetector, XceptionBreedPredictor, IMAGENET_DOG_CLASSES};
pub use config::VisionConfig;
pub use detector::{BreedPredictor, DogDetector, FaceDetector};
pub use error::{VisionError, VisionResult};
pub use face::FaceRect;
#[cfg(feature = "opencv")]
pub use face::OpenCvFaceDetector;
pub use onnx::{ModelOutput, OnnxModel};
pub use pipeline::Classifier;
