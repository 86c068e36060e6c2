//! Prediction result data structures

use serde::{Deserialize, Serialize};

/// Result of a single prediction call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionResult {
    /// Class name from the label set (single estimator prediction)
    Label(String),
    /// Raw estimator output, passed through unchanged
    Values(Vec<f64>),
    /// Argmax class index per input row (network backends)
    Classes(Vec<usize>),
}

impl PredictionResult {
    /// Label for single-class estimator output, if one was mapped.
    pub fn label(&self) -> Option<&str> {
        match self {
            PredictionResult::Label(label) => Some(label),
            _ => None,
        }
    }
}

/// Ordered class names used to turn a class index into a label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(Vec<String>);

impl LabelSet {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    /// Look up the label for a numeric prediction.
    ///
    /// Only exact non-negative integers inside the set map to a label.
    pub fn lookup(&self, value: f64) -> Option<&str> {
        if value.fract() != 0.0 || value < 0.0 {
            return None;
        }
        self.0.get(value as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for LabelSet {
    /// Iris species, the classes of the bundled demo model.
    fn default() -> Self {
        Self::new(["setosa", "versicolor", "virginica"])
    }
}
