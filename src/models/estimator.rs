//! Serializable tabular estimators
//!
//! Estimators are stored as serde documents, either JSON (`.json`) or
//! bincode (`.bincode`). Each variant implements its own `predict` over a
//! 2-D batch and returns one value per row: a class index for classifiers,
//! a real value for regressors.

use crate::error::{InferenceError, Result};
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A node of a serialized decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// Go to `left` when `x[feature] <= threshold`, otherwise `right`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Predicted class index or value
    Leaf { value: f64 },
}

/// Tabular estimator families
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimator {
    /// Linear decision function per class.
    ///
    /// One coefficient row is a binary classifier (class 1 when the decision
    /// value is positive); several rows pick the class with the highest
    /// decision value.
    LinearClassifier {
        coefficients: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
    },
    /// Binary decision tree, root at index 0
    DecisionTree { n_features: usize, nodes: Vec<TreeNode> },
    /// Ordinary linear regression
    LinearRegressor { coefficients: Vec<f64>, intercept: f64 },
}

impl Estimator {
    /// Decode a JSON estimator document.
    pub fn from_json(bytes: &[u8]) -> std::result::Result<Self, String> {
        let estimator: Estimator = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        estimator.validate()?;
        Ok(estimator)
    }

    /// Decode a bincode estimator document.
    pub fn from_bincode(bytes: &[u8]) -> std::result::Result<Self, String> {
        let estimator: Estimator = bincode::deserialize(bytes).map_err(|e| e.to_string())?;
        estimator.validate()?;
        Ok(estimator)
    }

    /// Write the estimator in the format implied by the path's extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let bytes = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::to_vec_pretty(self)?,
            Some("bincode") => bincode::serialize(self)?,
            other => anyhow::bail!(
                "cannot save estimator as {:?}, use a .json or .bincode path",
                other.unwrap_or_default()
            ),
        };
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Number of input features the estimator expects.
    pub fn n_features(&self) -> usize {
        match self {
            Estimator::LinearClassifier { coefficients, .. } => {
                coefficients.first().map(Vec::len).unwrap_or(0)
            }
            Estimator::DecisionTree { n_features, .. } => *n_features,
            Estimator::LinearRegressor { coefficients, .. } => coefficients.len(),
        }
    }

    /// Short family name for logs.
    pub fn family(&self) -> &'static str {
        match self {
            Estimator::LinearClassifier { .. } => "linear_classifier",
            Estimator::DecisionTree { .. } => "decision_tree",
            Estimator::LinearRegressor { .. } => "linear_regressor",
        }
    }

    /// Predict one value per row of `batch`.
    pub fn predict(&self, batch: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        let expected = self.n_features();
        if batch.ncols() != expected {
            return Err(InferenceError::UnsupportedInput(format!(
                "model expects {} features per row, got {}",
                expected,
                batch.ncols()
            )));
        }

        Ok(batch.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        match self {
            Estimator::LinearClassifier {
                coefficients,
                intercepts,
            } => {
                let scores: Vec<f64> = coefficients
                    .iter()
                    .zip(intercepts)
                    .map(|(coef, b)| dot(coef, row) + b)
                    .collect();

                if scores.len() == 1 {
                    if scores[0] > 0.0 {
                        1.0
                    } else {
                        0.0
                    }
                } else {
                    argmax(&scores) as f64
                }
            }
            Estimator::DecisionTree { nodes, .. } => {
                let mut index = 0;
                loop {
                    match &nodes[index] {
                        TreeNode::Leaf { value } => break *value,
                        TreeNode::Split {
                            feature,
                            threshold,
                            left,
                            right,
                        } => {
                            index = if row[*feature] <= *threshold {
                                *left
                            } else {
                                *right
                            };
                        }
                    }
                }
            }
            Estimator::LinearRegressor {
                coefficients,
                intercept,
            } => dot(coefficients, row) + intercept,
        }
    }

    /// Structural checks run after decoding.
    fn validate(&self) -> std::result::Result<(), String> {
        match self {
            Estimator::LinearClassifier {
                coefficients,
                intercepts,
            } => {
                let width = coefficients.first().map(Vec::len).unwrap_or(0);
                if width == 0 {
                    return Err("linear classifier has no coefficients".to_string());
                }
                if coefficients.iter().any(|c| c.len() != width) {
                    return Err("linear classifier rows have different widths".to_string());
                }
                if intercepts.len() != coefficients.len() {
                    return Err(format!(
                        "linear classifier has {} coefficient rows but {} intercepts",
                        coefficients.len(),
                        intercepts.len()
                    ));
                }
            }
            Estimator::DecisionTree { n_features, nodes } => {
                if nodes.is_empty() {
                    return Err("decision tree has no nodes".to_string());
                }
                if *n_features == 0 {
                    return Err("decision tree has no features".to_string());
                }
                for (i, node) in nodes.iter().enumerate() {
                    if let TreeNode::Split {
                        feature,
                        left,
                        right,
                        ..
                    } = node
                    {
                        // children must point forward, which also rules out cycles
                        if *feature >= *n_features
                            || *left <= i
                            || *right <= i
                            || *left >= nodes.len()
                            || *right >= nodes.len()
                        {
                            return Err(format!("decision tree node {} is malformed", i));
                        }
                    }
                }
            }
            Estimator::LinearRegressor { coefficients, .. } => {
                if coefficients.is_empty() {
                    return Err("linear regressor has no coefficients".to_string());
                }
            }
        }
        Ok(())
    }
}

fn dot(coef: &[f64], row: ArrayView1<'_, f64>) -> f64 {
    coef.iter().zip(row.iter()).map(|(c, x)| c * x).sum()
}

/// Index of the first maximum.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn iris_classifier() -> Estimator {
        Estimator::LinearClassifier {
            coefficients: vec![vec![-1.0, 2.0], vec![0.5, -0.5], vec![1.5, -1.5]],
            intercepts: vec![0.0, 0.0, -2.0],
        }
    }

    #[test]
    fn test_linear_classifier_multiclass() {
        let estimator = iris_classifier();
        let batch = array![[5.1, 3.5], [6.0, 2.2], [7.7, 2.6]];
        let predictions = estimator.predict(batch.view()).unwrap();
        // row 0: [1.9, 0.8, 0.4]; row 1: [-1.6, 1.9, 3.7]; row 2: [-2.5, 2.55, 5.65]
        assert_eq!(predictions, vec![0.0, 2.0, 2.0]);
    }

    #[test]
    fn test_linear_classifier_binary() {
        let estimator = Estimator::LinearClassifier {
            coefficients: vec![vec![1.0, -1.0]],
            intercepts: vec![0.0],
        };
        let predictions = estimator.predict(array![[2.0, 1.0], [1.0, 2.0]].view()).unwrap();
        assert_eq!(predictions, vec![1.0, 0.0]);
    }

    #[test]
    fn test_decision_tree() {
        let estimator = Estimator::DecisionTree {
            n_features: 2,
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 5.0,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: 0.0 },
                TreeNode::Split {
                    feature: 1,
                    threshold: 3.0,
                    left: 3,
                    right: 4,
                },
                TreeNode::Leaf { value: 1.0 },
                TreeNode::Leaf { value: 2.0 },
            ],
        };
        let batch = array![[4.0, 9.0], [6.0, 2.0], [6.0, 3.5]];
        assert_eq!(estimator.predict(batch.view()).unwrap(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_linear_regressor() {
        let estimator = Estimator::LinearRegressor {
            coefficients: vec![2.0, 0.5],
            intercept: 1.0,
        };
        let predictions = estimator.predict(array![[1.0, 2.0]].view()).unwrap();
        assert_eq!(predictions, vec![4.0]);
    }

    #[test]
    fn test_feature_count_mismatch() {
        let err = iris_classifier()
            .predict(array![[1.0, 2.0, 3.0]].view())
            .unwrap_err();
        assert!(matches!(err, InferenceError::UnsupportedInput(_)));
    }

    #[test]
    fn test_json_and_bincode_decode() {
        let estimator = iris_classifier();
        let json = serde_json::to_vec(&estimator).unwrap();
        assert_eq!(Estimator::from_json(&json).unwrap(), estimator);

        let bin = bincode::serialize(&estimator).unwrap();
        assert_eq!(Estimator::from_bincode(&bin).unwrap(), estimator);
    }

    #[test]
    fn test_invalid_documents_rejected() {
        assert!(Estimator::from_json(b"not json").is_err());

        let cyclic = Estimator::DecisionTree {
            n_features: 1,
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 0.0,
                left: 0,
                right: 0,
            }],
        };
        let json = serde_json::to_vec(&cyclic).unwrap();
        assert!(Estimator::from_json(&json).is_err());

        let uneven = Estimator::LinearClassifier {
            coefficients: vec![vec![1.0, 2.0], vec![1.0]],
            intercepts: vec![0.0, 0.0],
        };
        let json = serde_json::to_vec(&uneven).unwrap();
        assert!(Estimator::from_json(&json).is_err());
    }
}
