//! Human / dog / unknown decision over the three detectors.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use metrics::counter;
use tracing::{debug, info, warn};
use woof_models::Verdict;

use crate::breeds::BreedNames;
use crate::classifier::{ResNetDogDetector, XceptionBreedPredictor};
use crate::config::VisionConfig;
use crate::detector::{BreedPredictor, DogDetector, FaceDetector};
#[cfg(not(feature = "opencv"))]
use crate::error::VisionError;
use crate::error::VisionResult;
use crate::tensor::load_image;

/// Counter of classified images, labelled by verdict kind.
pub const CLASSIFICATIONS_TOTAL: &str = "woof_classifications_total";

/// Loaded models plus the decision procedure.
#[derive(Clone)]
pub struct Classifier {
    face: Arc<dyn FaceDetector>,
    dog: Arc<dyn DogDetector>,
    breed: Arc<dyn BreedPredictor>,
}

impl Classifier {
    pub fn new(
        face: Arc<dyn FaceDetector>,
        dog: Arc<dyn DogDetector>,
        breed: Arc<dyn BreedPredictor>,
    ) -> Self {
        Self { face, dog, breed }
    }

    /// Load every model named in the config. Fails on the first missing or
    /// unreadable file.
    pub fn load(config: &VisionConfig) -> VisionResult<Self> {
        let started = Instant::now();

        let face = load_face_detector(&config.cascade_path)?;
        let dog = ResNetDogDetector::load(&config.resnet_path, config.dog_classes.clone())?;
        let names = BreedNames::load(&config.breed_names_path)?;
        let breed =
            XceptionBreedPredictor::load(&config.bottleneck_path, &config.head_path, names)?;

        info!(
            load_ms = started.elapsed().as_millis() as u64,
            dog_classes = ?config.dog_classes,
            "Classifier ready"
        );

        Ok(Self::new(face, Arc::new(dog), Arc::new(breed)))
    }

    /// Decide what an image shows.
    ///
    /// A detected face wins over a dog; the breed model only runs when one
    /// of the two detectors fired.
    pub fn classify_image(&self, image: &DynamicImage) -> VisionResult<Verdict> {
        let verdict = if self.face.contains_face(image)? {
            Verdict::Human {
                breed: self.breed.predict_breed(image)?,
            }
        } else if self.dog.contains_dog(image)? {
            Verdict::Dog {
                breed: self.breed.predict_breed(image)?,
            }
        } else {
            Verdict::Unknown
        };
        Ok(verdict)
    }

    pub fn classify_path(&self, path: &Path) -> VisionResult<Verdict> {
        let image = load_image(path)?;
        self.classify_image(&image)
    }

    /// Classify several files in order. A file that cannot be processed
    /// yields [`Verdict::Failed`] without affecting the others.
    pub fn classify_paths(&self, paths: &[PathBuf]) -> Vec<Verdict> {
        paths
            .iter()
            .map(|path| {
                let started = Instant::now();
                let verdict = match self.classify_path(path) {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Image classification failed");
                        Verdict::Failed {
                            reason: if e.is_bad_input() {
                                "unreadable image".to_string()
                            } else {
                                "inference error".to_string()
                            },
                        }
                    }
                };
                counter!(CLASSIFICATIONS_TOTAL, "verdict" => verdict.as_str()).increment(1);
                debug!(
                    path = %path.display(),
                    verdict = verdict.as_str(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Image classified"
                );
                verdict
            })
            .collect()
    }
}

#[cfg(feature = "opencv")]
fn load_face_detector(path: &Path) -> VisionResult<Arc<dyn FaceDetector>> {
    Ok(Arc::new(crate::face::OpenCvFaceDetector::load(path)?))
}

#[cfg(not(feature = "opencv"))]
fn load_face_detector(path: &Path) -> VisionResult<Arc<dyn FaceDetector>> {
    if !path.exists() {
        return Err(VisionError::ModelNotFound(path.to_path_buf()));
    }
    Err(VisionError::model_load(
        path,
        "face detection requires the `opencv` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VisionError;
    use crate::face::FaceRect;
    use image::RgbImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubFace(bool);

    impl FaceDetector for StubFace {
        fn detect_faces(&self, _image: &DynamicImage) -> VisionResult<Vec<FaceRect>> {
            Ok(if self.0 {
                vec![FaceRect {
                    x: 0,
                    y: 0,
                    width: 4,
                    height: 4,
                }]
            } else {
                vec![]
            })
        }
    }

    struct StubDog(bool);

    impl DogDetector for StubDog {
        fn contains_dog(&self, _image: &DynamicImage) -> VisionResult<bool> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct CountingBreed {
        calls: AtomicUsize,
    }

    impl BreedPredictor for CountingBreed {
        fn predict_breed(&self, _image: &DynamicImage) -> VisionResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("Beagle".to_string())
        }
    }

    struct FailingDog;

    impl DogDetector for FailingDog {
        fn contains_dog(&self, _image: &DynamicImage) -> VisionResult<bool> {
            Err(VisionError::inference("boom"))
        }
    }

    fn classifier(face: bool, dog: bool) -> (Classifier, Arc<CountingBreed>) {
        let breed = Arc::new(CountingBreed::default());
        let classifier = Classifier::new(
            Arc::new(StubFace(face)),
            Arc::new(StubDog(dog)),
            breed.clone(),
        );
        (classifier, breed)
    }

    fn image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(8, 8))
    }

    #[test]
    fn test_face_wins_over_dog() {
        let (classifier, _) = classifier(true, true);
        assert_eq!(
            classifier.classify_image(&image()).unwrap(),
            Verdict::Human {
                breed: "Beagle".to_string()
            }
        );
    }

    #[test]
    fn test_dog_without_face() {
        let (classifier, breed) = classifier(false, true);
        assert_eq!(
            classifier.classify_image(&image()).unwrap(),
            Verdict::Dog {
                breed: "Beagle".to_string()
            }
        );
        assert_eq!(breed.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_skips_breed_model() {
        let (classifier, breed) = classifier(false, false);
        assert_eq!(classifier.classify_image(&image()).unwrap(), Verdict::Unknown);
        assert_eq!(breed.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_classify_paths_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        image().save(&good).unwrap();
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"definitely not a png").unwrap();

        let (classifier, _) = classifier(false, true);
        let verdicts = classifier.classify_paths(&[bad, good]);

        assert_eq!(verdicts.len(), 2);
        assert!(matches!(verdicts[0], Verdict::Failed { .. }));
        assert!(matches!(verdicts[1], Verdict::Dog { .. }));
    }

    #[test]
    fn test_inference_error_becomes_failed_verdict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        image().save(&path).unwrap();

        let classifier = Classifier::new(
            Arc::new(StubFace(false)),
            Arc::new(FailingDog),
            Arc::new(CountingBreed::default()),
        );
        let verdicts = classifier.classify_paths(&[path]);
        assert_eq!(
            verdicts,
            vec![Verdict::Failed {
                reason: "inference error".to_string()
            }]
        );
    }

    #[test]
    fn test_load_fails_on_missing_models() {
        let dir = tempfile::tempdir().unwrap();
        let err = Classifier::load(&VisionConfig::from_dir(dir.path())).err().unwrap();
        assert!(matches!(err, VisionError::ModelNotFound(_)));
    }
}
