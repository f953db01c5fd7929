//! ONNX Runtime session wrapper.
//!
//! Sessions are created once at startup and shared; `Session::run` needs
//! exclusive access, so each model sits behind its own mutex.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use metrics::histogram;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::error::{VisionError, VisionResult};

/// Histogram of single-model inference latency, labelled by model name.
pub const INFERENCE_DURATION_SECONDS: &str = "woof_inference_duration_seconds";

/// Output of a model run: shape plus row-major data.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// A loaded single-input, single-output model.
pub struct OnnxModel {
    name: &'static str,
    path: PathBuf,
    session: Mutex<Session>,
}

impl OnnxModel {
    /// Load a model file.
    pub fn load(name: &'static str, path: &Path) -> VisionResult<Self> {
        if !path.exists() {
            return Err(VisionError::ModelNotFound(path.to_path_buf()));
        }

        let started = Instant::now();
        let session = create_session(path)?;
        info!(
            model = name,
            path = %path.display(),
            load_ms = started.elapsed().as_millis() as u64,
            "ONNX model loaded"
        );

        Ok(Self {
            name,
            path: path.to_path_buf(),
            session: Mutex::new(session),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the model on one float tensor.
    pub fn run(&self, shape: &[usize], data: Vec<f32>) -> VisionResult<ModelOutput> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(VisionError::internal(format!(
                "{}: tensor data length {} does not match shape {:?}",
                self.name,
                data.len(),
                shape
            )));
        }

        let input = Tensor::from_array((shape.to_vec(), data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| VisionError::inference(format!("{}: failed to create tensor: {}", self.name, e)))?;

        let started = Instant::now();
        let mut session = self
            .session
            .lock()
            .map_err(|_| VisionError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::inference(format!("{}: {}", self.name, e)))?;

        let (out_shape, out_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::inference(format!("{}: failed to extract tensor: {}", self.name, e)))?;

        let shape = out_shape
            .iter()
            .map(|&d| {
                usize::try_from(d).map_err(|_| {
                    VisionError::OutputShape(format!("{}: dynamic dimension {} in output", self.name, d))
                })
            })
            .collect::<VisionResult<Vec<_>>>()?;
        let data = out_data.to_vec();
        drop(outputs);
        drop(session);

        let elapsed = started.elapsed();
        histogram!(INFERENCE_DURATION_SECONDS, "model" => self.name).record(elapsed.as_secs_f64());
        debug!(
            model = self.name,
            shape = ?shape,
            duration_ms = elapsed.as_millis() as u64,
            "Inference completed"
        );

        Ok(ModelOutput { shape, data })
    }
}

/// Create ONNX Runtime session with automatic execution provider selection.
fn create_session(model_path: &Path) -> VisionResult<Session> {
    let model_bytes = std::fs::read(model_path)?;

    let builder = Session::builder()
        .map_err(|e| VisionError::model_load(model_path, format!("session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| VisionError::model_load(model_path, format!("optimization level: {}", e)))?;

    // Try CUDA on Linux with cuda feature
    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    // Try CoreML on macOS
    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| VisionError::model_load(model_path, e.to_string()))
}
