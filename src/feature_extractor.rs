//! Feature extraction for model inference.
//!
//! Turns request payloads into the numeric inputs the models expect: named
//! JSON records become a feature row in configured order, encoded images
//! become 28×28 grayscale pixels scaled to `[0, 1]`.

use crate::error::{InferenceError, Result};
use image::imageops::FilterType;
use serde_json::{Map, Value};

/// Side length of the square image fed to the networks
pub const IMAGE_SIDE: u32 = 28;

/// Number of pixels in a normalized image
pub const IMAGE_PIXELS: usize = (IMAGE_SIDE * IMAGE_SIDE) as usize;

/// Feature extractor that maps named records onto model columns.
///
/// Features are extracted in the exact order the model was trained on.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    names: Vec<String>,
}

impl FeatureExtractor {
    /// Create a feature extractor for the given column names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Extract a feature row from a JSON object.
    ///
    /// Every configured name must be present and non-null; all missing names
    /// are reported together. Zero is a valid value.
    pub fn extract(&self, record: &Map<String, Value>) -> Result<Vec<f64>> {
        let missing: Vec<&str> = self
            .names
            .iter()
            .filter(|name| record.get(name.as_str()).map_or(true, Value::is_null))
            .map(String::as_str)
            .collect();

        if !missing.is_empty() {
            return Err(self.missing(&missing));
        }

        self.names
            .iter()
            .map(|name| {
                record[name.as_str()].as_f64().ok_or_else(|| {
                    InferenceError::Validation(format!("Feature '{}' must be a number", name))
                })
            })
            .collect()
    }

    /// Extract a feature row from any JSON value; non-objects miss every feature.
    pub fn extract_value(&self, value: &Value) -> Result<Vec<f64>> {
        match value.as_object() {
            Some(record) => self.extract(record),
            None => {
                let all: Vec<&str> = self.names.iter().map(String::as_str).collect();
                Err(self.missing(&all))
            }
        }
    }

    fn missing(&self, names: &[&str]) -> InferenceError {
        InferenceError::Validation(format!("Missing required features: {}", names.join(", ")))
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        self.names.len()
    }

    /// Get feature names in column order.
    pub fn feature_names(&self) -> &[String] {
        &self.names
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(["feature1", "feature2"])
    }
}

/// Decode an image and normalize it for the networks.
///
/// Any format the `image` crate can decode is accepted. The image is
/// converted to 8-bit grayscale, resized to 28×28 with a bicubic filter and
/// divided by 255, giving 784 values in row-major order.
pub fn image_pixels(bytes: &[u8]) -> Result<Vec<f32>> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| InferenceError::UnsupportedInput(format!("cannot decode image: {}", e)))?;

    let pixels = decoded
        .grayscale()
        .resize_exact(IMAGE_SIDE, IMAGE_SIDE, FilterType::CatmullRom)
        .to_luma8();

    Ok(pixels.into_raw().into_iter().map(|p| p as f32 / 255.0).collect())
}
