//! Model file locations and detector settings.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crate::classifier::IMAGENET_DOG_CLASSES;

/// Default directory holding the pretrained artifacts.
pub const DEFAULT_MODEL_DIR: &str = "./utility_files";

/// Vision configuration.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// Frontal face Haar cascade (OpenCV XML)
    pub cascade_path: PathBuf,
    /// ImageNet ResNet50 (ONNX, NHWC 224x224 input)
    pub resnet_path: PathBuf,
    /// Xception feature extractor without top (ONNX)
    pub bottleneck_path: PathBuf,
    /// Trained breed head: pooling + dense softmax (ONNX)
    pub head_path: PathBuf,
    /// Class index -> breed name table
    pub breed_names_path: PathBuf,
    /// ImageNet class indices counted as "dog"
    pub dog_classes: RangeInclusive<usize>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self::from_dir(DEFAULT_MODEL_DIR)
    }
}

impl VisionConfig {
    /// Use the standard file names inside `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            cascade_path: dir.join("haarcascade_frontalface_alt.xml"),
            resnet_path: dir.join("resnet50.onnx"),
            bottleneck_path: dir.join("xception_bottleneck.onnx"),
            head_path: dir.join("xception_head.onnx"),
            breed_names_path: dir.join("dog_names.pickle"),
            dog_classes: IMAGENET_DOG_CLASSES,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let dir = std::env::var("MODEL_DIR").unwrap_or_else(|_| DEFAULT_MODEL_DIR.to_string());
        let mut config = Self::from_dir(dir);

        if let Ok(path) = std::env::var("BREED_NAMES_PATH") {
            config.breed_names_path = PathBuf::from(path);
        }

        let min = std::env::var("DOG_CLASS_MIN")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(*IMAGENET_DOG_CLASSES.start());
        let max = std::env::var("DOG_CLASS_MAX")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(*IMAGENET_DOG_CLASSES.end());
        config.dog_classes = min..=max;

        config
    }

    /// All model files, for existence checks and logging.
    pub fn model_files(&self) -> [&Path; 5] {
        [
            &self.cascade_path,
            &self.resnet_path,
            &self.bottleneck_path,
            &self.head_path,
            &self.breed_names_path,
        ]
    }

    /// Files that are configured but absent.
    pub fn missing_files(&self) -> Vec<PathBuf> {
        self.model_files()
            .into_iter()
            .filter(|p| !p.exists())
            .map(Path::to_path_buf)
            .collect()
    }
}
