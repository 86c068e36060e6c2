//! Error types for model loading and prediction dispatch

use crate::models::handle::BackendKind;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the inference layer.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// File extension is not one of the supported model formats
    #[error(
        "Model format '{extension}' not supported. Please use '.json', '.bincode', '.onnx', or '.ort'."
    )]
    UnsupportedFormat { extension: String },

    /// Model file missing, unreadable or corrupt
    #[error("Failed to read model from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Operation not available for the loaded backend kind
    #[error("{operation} is not supported for {kind} models")]
    UnsupportedModelType {
        kind: BackendKind,
        operation: &'static str,
    },

    /// Input cannot be normalized to the shape or type the model expects
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    /// Request payload failed validation
    #[error("{0}")]
    Validation(String),

    /// Unknown scaler name for the preprocessing pipeline
    #[error("Unsupported scaler type: '{0}'. Use 'standard' or 'minmax'.")]
    UnsupportedScaler(String),

    /// Failure inside the native runtime
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl InferenceError {
    /// Wrap a decoding failure as an IO-kind error for `path`.
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        InferenceError::Io {
            path: path.into(),
            source: io::Error::new(io::ErrorKind::InvalidData, reason.to_string()),
        }
    }

    /// Errors caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            InferenceError::UnsupportedInput(_) | InferenceError::Validation(_)
        )
    }

    /// Short machine-readable name, used for metrics and log fields.
    pub fn kind_name(&self) -> &'static str {
        match self {
            InferenceError::UnsupportedFormat { .. } => "unsupported_format",
            InferenceError::Io { .. } => "io",
            InferenceError::UnsupportedModelType { .. } => "unsupported_model_type",
            InferenceError::UnsupportedInput(_) => "unsupported_input",
            InferenceError::Validation(_) => "validation",
            InferenceError::UnsupportedScaler(_) => "unsupported_scaler",
            InferenceError::Runtime(_) => "runtime",
        }
    }
}

impl From<ort::Error> for InferenceError {
    fn from(err: ort::Error) -> Self {
        InferenceError::Runtime(err.to_string())
    }
}

/// Result alias for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
