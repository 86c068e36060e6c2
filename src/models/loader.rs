//! Model loader with format detection by file extension

use crate::error::{InferenceError, Result};
use crate::models::estimator::Estimator;
use crate::models::handle::{ModelFormat, ModelHandle};
use crate::models::session::{LiteInterpreter, OnnxNetwork};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Loader for every supported model format
#[derive(Debug, Clone)]
pub struct ModelLoader {
    /// Number of intra-op threads for ONNX Runtime sessions
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    pub fn onnx_threads(&self) -> usize {
        self.onnx_threads
    }

    /// Load a model, choosing the runtime from the file extension.
    ///
    /// Exactly one file is read. Unknown extensions fail before touching the
    /// filesystem.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<ModelHandle> {
        let path = path.as_ref();
        let format = ModelFormat::from_path(path)?;
        let started = Instant::now();

        info!(
            path = %path.display(),
            format = format.extension(),
            kind = %format.backend_kind(),
            "Loading model"
        );

        let bytes = std::fs::read(path).map_err(|source| InferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let handle = match format {
            ModelFormat::EstimatorJson => {
                let estimator =
                    Estimator::from_json(&bytes).map_err(|e| InferenceError::corrupt(path, e))?;
                debug!(
                    family = estimator.family(),
                    features = estimator.n_features(),
                    "Estimator decoded"
                );
                ModelHandle::estimator(estimator, path)
            }
            ModelFormat::EstimatorBincode => {
                let estimator = Estimator::from_bincode(&bytes)
                    .map_err(|e| InferenceError::corrupt(path, e))?;
                debug!(
                    family = estimator.family(),
                    features = estimator.n_features(),
                    "Estimator decoded"
                );
                ModelHandle::estimator(estimator, path)
            }
            ModelFormat::OnnxNetwork => {
                let network = OnnxNetwork::from_bytes(&bytes, self.onnx_threads)
                    .map_err(|e| InferenceError::corrupt(path, e))?;
                ModelHandle::network(Box::new(network), path)
            }
            ModelFormat::OrtLite => {
                let interpreter = LiteInterpreter::from_bytes(&bytes, self.onnx_threads)
                    .map_err(|e| InferenceError::corrupt(path, e))?;
                ModelHandle::interpreter(Box::new(interpreter), path)
            }
        };

        info!(
            path = %path.display(),
            kind = %handle.kind(),
            input_shape = ?handle.input_shape_hint(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model loaded successfully"
        );

        Ok(handle)
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
