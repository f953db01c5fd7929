//! CNN-backed dog detection and breed prediction.

use std::ops::RangeInclusive;
use std::path::Path;

use image::DynamicImage;
use ndarray::{ArrayView, ArrayView1, Axis, Ix1, IxDyn};
use tracing::debug;

use crate::breeds::BreedNames;
use crate::detector::{BreedPredictor, DogDetector};
use crate::error::{VisionError, VisionResult};
use crate::onnx::{ModelOutput, OnnxModel};
use crate::tensor::{argmax, to_tensor, Preprocess, INPUT_SIZE};

/// ImageNet class indices 151 ("Chihuahua") to 268 ("Mexican hairless").
///
/// Known limitation: "is a dog" is decided purely by where the argmax lands
/// in the ImageNet-1k label order. A model trained with any other label
/// order needs a different range (see `VisionConfig::dog_classes`).
pub const IMAGENET_DOG_CLASSES: RangeInclusive<usize> = 151..=268;

/// Number of classes of an ImageNet-1k classifier.
pub const IMAGENET_CLASSES: usize = 1000;

/// Scores of a `[1, N]` (or `[N]`) model output.
fn class_scores<'a>(model: &str, output: &'a ModelOutput) -> VisionResult<ArrayView1<'a, f32>> {
    let view = ArrayView::from_shape(IxDyn(&output.shape), &output.data)
        .map_err(|e| VisionError::OutputShape(format!("{}: {}", model, e)))?;
    let view = match output.shape.as_slice() {
        [1, _] => view.index_axis_move(Axis(0), 0),
        [_] => view,
        other => {
            return Err(VisionError::OutputShape(format!(
                "{}: expected [1, classes], got {:?}",
                model, other
            )))
        }
    };
    view.into_dimensionality::<Ix1>()
        .map_err(|e| VisionError::OutputShape(format!("{}: {}", model, e)))
}

fn top_class(model: &str, output: &ModelOutput) -> VisionResult<usize> {
    let scores = class_scores(model, output)?;
    let scores = scores.to_vec();
    argmax(&scores).ok_or_else(|| VisionError::OutputShape(format!("{}: no class scores", model)))
}

/// Breed named by a head output.
///
/// The head must score exactly one class per table entry; anything else
/// means the head and the table come from different trainings.
pub fn breed_for<'a>(
    model: &str,
    names: &'a BreedNames,
    output: &ModelOutput,
) -> VisionResult<(usize, &'a str)> {
    let scores = class_scores(model, output)?;
    if scores.len() != names.len() {
        return Err(VisionError::OutputShape(format!(
            "{} predicts {} classes but the breed table has {} names",
            model,
            scores.len(),
            names.len()
        )));
    }
    let class = top_class(model, output)?;
    let breed = names
        .get(class)
        .ok_or_else(|| VisionError::internal(format!("class {} outside breed table", class)))?;
    Ok((class, breed))
}

/// Dog detector using an ImageNet ResNet50.
pub struct ResNetDogDetector {
    model: OnnxModel,
    dog_classes: RangeInclusive<usize>,
}

impl ResNetDogDetector {
    pub fn load(path: &Path, dog_classes: RangeInclusive<usize>) -> VisionResult<Self> {
        Ok(Self::new(OnnxModel::load("resnet50", path)?, dog_classes))
    }

    pub fn new(model: OnnxModel, dog_classes: RangeInclusive<usize>) -> Self {
        Self { model, dog_classes }
    }

    /// Most likely ImageNet class.
    pub fn predict_class(&self, image: &DynamicImage) -> VisionResult<usize> {
        let tensor = to_tensor(image, INPUT_SIZE, Preprocess::Caffe);
        let output = self.model.run(&tensor.shape, tensor.data)?;
        top_class(self.model.name(), &output)
    }
}

impl DogDetector for ResNetDogDetector {
    fn contains_dog(&self, image: &DynamicImage) -> VisionResult<bool> {
        let class = self.predict_class(image)?;
        let is_dog = self.dog_classes.contains(&class);
        debug!(class, is_dog, "Dog detection completed");
        Ok(is_dog)
    }
}

/// Breed classifier: frozen Xception features feeding the trained head.
pub struct XceptionBreedPredictor {
    extractor: OnnxModel,
    head: OnnxModel,
    names: BreedNames,
}

impl XceptionBreedPredictor {
    pub fn load(bottleneck: &Path, head: &Path, names: BreedNames) -> VisionResult<Self> {
        Ok(Self {
            extractor: OnnxModel::load("xception_bottleneck", bottleneck)?,
            head: OnnxModel::load("xception_head", head)?,
            names,
        })
    }

    pub fn names(&self) -> &BreedNames {
        &self.names
    }

    /// Bottleneck features of an image (`[1, 7, 7, 2048]` for 224x224 input).
    pub fn extract_features(&self, image: &DynamicImage) -> VisionResult<ModelOutput> {
        let tensor = to_tensor(image, INPUT_SIZE, Preprocess::Tf);
        let features = self.extractor.run(&tensor.shape, tensor.data)?;
        if features.shape.len() != 4 || features.shape[0] != 1 {
            return Err(VisionError::OutputShape(format!(
                "{}: expected [1, h, w, c] features, got {:?}",
                self.extractor.name(),
                features.shape
            )));
        }
        Ok(features)
    }
}

impl BreedPredictor for XceptionBreedPredictor {
    fn predict_breed(&self, image: &DynamicImage) -> VisionResult<String> {
        let features = self.extract_features(image)?;
        let output = self.head.run(&features.shape, features.data)?;
        let (class, breed) = breed_for(self.head.name(), &self.names, &output)?;
        debug!(class, breed, "Breed prediction completed");
        Ok(breed.to_string())
    }
}
