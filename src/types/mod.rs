//! Request and result types shared by the model layer and the HTTP adapter

pub mod input;
pub mod prediction;

pub use input::TabularInput;
pub use prediction::{LabelSet, PredictionResult};
