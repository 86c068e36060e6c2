//! ML model loading and inference components

pub mod estimator;
pub mod handle;
pub mod inference;
pub mod loader;
pub mod pipeline;
pub mod runtime;
pub mod session;

pub use estimator::{Estimator, TreeNode};
pub use handle::{Backend, BackendKind, ModelFormat, ModelHandle};
pub use inference::InferenceEngine;
pub use loader::ModelLoader;
pub use pipeline::{Pipeline, Scaler, ScalerKind};
pub use runtime::{
    ElementType, InputTensor, OutputTensor, TensorData, TensorDescriptor, TensorRuntime,
};
pub use session::{LiteInterpreter, OnnxNetwork};
