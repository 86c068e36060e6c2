//! Loaded model handle and backend kinds

use crate::error::{InferenceError, Result};
use crate::models::estimator::Estimator;
use crate::models::runtime::TensorRuntime;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Runtime family a loaded model belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Serialized estimator evaluated in-process
    TabularEstimator,
    /// Saved neural network executed by ONNX Runtime
    KerasNetwork,
    /// Lite network executed through pre-allocated interpreter buffers
    LiteInterpreter,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::TabularEstimator => "tabular_estimator",
            BackendKind::KerasNetwork => "keras_network",
            BackendKind::LiteInterpreter => "lite_interpreter",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk model format, one per supported file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// `.json` serialized estimator
    EstimatorJson,
    /// `.bincode` serialized estimator
    EstimatorBincode,
    /// `.onnx` saved network
    OnnxNetwork,
    /// `.ort` lite network
    OrtLite,
}

impl ModelFormat {
    /// Extension allow-list, matched case-sensitively.
    pub const SUPPORTED: [(&'static str, ModelFormat); 4] = [
        ("json", ModelFormat::EstimatorJson),
        ("bincode", ModelFormat::EstimatorBincode),
        ("onnx", ModelFormat::OnnxNetwork),
        ("ort", ModelFormat::OrtLite),
    ];

    /// Detect the format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

        Self::SUPPORTED
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, format)| *format)
            .ok_or_else(|| InferenceError::UnsupportedFormat {
                extension: extension.to_string(),
            })
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ModelFormat::EstimatorJson => "json",
            ModelFormat::EstimatorBincode => "bincode",
            ModelFormat::OnnxNetwork => "onnx",
            ModelFormat::OrtLite => "ort",
        }
    }

    /// Backend kind produced by loading this format.
    pub fn backend_kind(&self) -> BackendKind {
        match self {
            ModelFormat::EstimatorJson | ModelFormat::EstimatorBincode => {
                BackendKind::TabularEstimator
            }
            ModelFormat::OnnxNetwork => BackendKind::KerasNetwork,
            ModelFormat::OrtLite => BackendKind::LiteInterpreter,
        }
    }
}

/// Native model object, one variant per backend kind
pub enum Backend {
    TabularEstimator(Estimator),
    KerasNetwork(Mutex<Box<dyn TensorRuntime>>),
    LiteInterpreter(Mutex<Box<dyn TensorRuntime>>),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::TabularEstimator(_) => BackendKind::TabularEstimator,
            Backend::KerasNetwork(_) => BackendKind::KerasNetwork,
            Backend::LiteInterpreter(_) => BackendKind::LiteInterpreter,
        }
    }
}

/// A loaded model.
///
/// Built once by the loader and never mutated afterwards. The backend kind
/// is derived from the backend variant, so it cannot drift from the native
/// object it describes.
pub struct ModelHandle {
    backend: Backend,
    input_shape_hint: Option<Vec<i64>>,
    source: PathBuf,
}

impl ModelHandle {
    /// Wrap a deserialized estimator.
    pub fn estimator(estimator: Estimator, source: impl Into<PathBuf>) -> Self {
        let hint = Some(vec![-1, estimator.n_features() as i64]);
        Self {
            backend: Backend::TabularEstimator(estimator),
            input_shape_hint: hint,
            source: source.into(),
        }
    }

    /// Wrap a saved-network runtime.
    pub fn network(runtime: Box<dyn TensorRuntime>, source: impl Into<PathBuf>) -> Self {
        let hint = Some(runtime.input().shape.clone());
        Self {
            backend: Backend::KerasNetwork(Mutex::new(runtime)),
            input_shape_hint: hint,
            source: source.into(),
        }
    }

    /// Wrap a lite-interpreter runtime whose buffers are already allocated.
    pub fn interpreter(runtime: Box<dyn TensorRuntime>, source: impl Into<PathBuf>) -> Self {
        let hint = Some(runtime.input().shape.clone());
        Self {
            backend: Backend::LiteInterpreter(Mutex::new(runtime)),
            input_shape_hint: hint,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Declared input shape, `-1` for dynamic dimensions.
    pub fn input_shape_hint(&self) -> Option<&[i64]> {
        self.input_shape_hint.as_deref()
    }

    /// File the model was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("kind", &self.kind())
            .field("input_shape_hint", &self.input_shape_hint)
            .field("source", &self.source)
            .finish()
    }
}

/// Lock a runtime for one inference pass.
pub(crate) fn lock_runtime(
    runtime: &Mutex<Box<dyn TensorRuntime>>,
) -> Result<MutexGuard<'_, Box<dyn TensorRuntime>>> {
    runtime
        .lock()
        .map_err(|e| InferenceError::Runtime(format!("Lock error: {}", e)))
}
