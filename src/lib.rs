//! Synapse inference library
//!
//! Loads a pre-trained model from disk, picking the runtime from the file
//! extension, and serves tabular and image predictions. A single HTTP
//! endpoint relays tabular predictions.

pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use error::{InferenceError, Result};
pub use feature_extractor::FeatureExtractor;
pub use models::inference::InferenceEngine;
pub use models::loader::ModelLoader;
pub use types::{LabelSet, PredictionResult, TabularInput};
