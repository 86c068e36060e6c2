//! Prediction request data structures

use crate::error::{InferenceError, Result};
use ndarray::Array2;
use serde::Serialize;
use serde_json::Value;

/// Tabular input: a single row of features or an already batched 2-D table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TabularInput {
    /// One record, promoted to a 1×K batch before prediction
    Row(Vec<f64>),
    /// N records of K features each
    Batch(Vec<Vec<f64>>),
}

impl TabularInput {
    /// Interpret an arbitrary JSON value as tabular input.
    ///
    /// Accepts a flat array of numbers or an array of equally sized numeric
    /// arrays. Everything else is rejected.
    pub fn from_json(value: &Value) -> Result<Self> {
        let items = value.as_array().ok_or_else(|| {
            InferenceError::UnsupportedInput(format!(
                "expected a list or a list of lists, got {}",
                json_type(value)
            ))
        })?;

        if items.iter().all(Value::is_array) && !items.is_empty() {
            let rows = items
                .iter()
                .map(|row| numeric_row(row.as_array().map(Vec::as_slice).unwrap_or_default()))
                .collect::<Result<Vec<_>>>()?;
            Ok(TabularInput::Batch(rows))
        } else {
            Ok(TabularInput::Row(numeric_row(items)?))
        }
    }

    /// Number of records in this input.
    pub fn rows(&self) -> usize {
        match self {
            TabularInput::Row(_) => 1,
            TabularInput::Batch(rows) => rows.len(),
        }
    }

    /// Normalize to a 2-D batch.
    ///
    /// A row becomes a one-row batch; a batch must be non-empty and
    /// rectangular.
    pub fn into_batch(self) -> Result<Array2<f64>> {
        match self {
            TabularInput::Row(row) => {
                if row.is_empty() {
                    return Err(InferenceError::UnsupportedInput(
                        "row has no features".to_string(),
                    ));
                }
                let width = row.len();
                Array2::from_shape_vec((1, width), row)
                    .map_err(|e| InferenceError::UnsupportedInput(e.to_string()))
            }
            TabularInput::Batch(rows) => {
                let width = rows.first().map(Vec::len).unwrap_or(0);
                if width == 0 {
                    return Err(InferenceError::UnsupportedInput(
                        "batch has no rows or no features".to_string(),
                    ));
                }
                if let Some(bad) = rows.iter().position(|r| r.len() != width) {
                    return Err(InferenceError::UnsupportedInput(format!(
                        "row {} has {} features, expected {}",
                        bad,
                        rows[bad].len(),
                        width
                    )));
                }
                let height = rows.len();
                let flat: Vec<f64> = rows.into_iter().flatten().collect();
                Array2::from_shape_vec((height, width), flat)
                    .map_err(|e| InferenceError::UnsupportedInput(e.to_string()))
            }
        }
    }
}

impl From<Vec<f64>> for TabularInput {
    fn from(row: Vec<f64>) -> Self {
        TabularInput::Row(row)
    }
}

impl From<Vec<Vec<f64>>> for TabularInput {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        TabularInput::Batch(rows)
    }
}

fn numeric_row(items: &[Value]) -> Result<Vec<f64>> {
    items
        .iter()
        .map(|v| {
            v.as_f64().ok_or_else(|| {
                InferenceError::UnsupportedInput(format!(
                    "expected numeric values, got {}",
                    json_type(v)
                ))
            })
        })
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_promoted_to_single_row_batch() {
        let batch = TabularInput::Row(vec![5.1, 3.5]).into_batch().unwrap();
        assert_eq!(batch.dim(), (1, 2));
        assert_eq!(batch[[0, 1]], 3.5);
    }

    #[test]
    fn test_batch_passes_through() {
        let batch = TabularInput::Batch(vec![vec![1.0, 2.0], vec![3.0, 4.0]])
            .into_batch()
            .unwrap();
        assert_eq!(batch.dim(), (2, 2));
        assert_eq!(batch[[1, 0]], 3.0);
    }

    #[test]
    fn test_ragged_batch_rejected() {
        let err = TabularInput::Batch(vec![vec![1.0, 2.0], vec![3.0]])
            .into_batch()
            .unwrap_err();
        assert!(matches!(err, InferenceError::UnsupportedInput(_)));
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert!(TabularInput::Row(vec![]).into_batch().is_err());
        assert!(TabularInput::Batch(vec![]).into_batch().is_err());
    }

    #[test]
    fn test_from_json_shapes() {
        assert_eq!(
            TabularInput::from_json(&json!([5.1, 3.5])).unwrap(),
            TabularInput::Row(vec![5.1, 3.5])
        );
        assert_eq!(
            TabularInput::from_json(&json!([[1, 2], [3, 4]])).unwrap(),
            TabularInput::Batch(vec![vec![1.0, 2.0], vec![3.0, 4.0]])
        );
    }

    #[test]
    fn test_from_json_rejects_other_shapes() {
        for value in [
            json!(5.0),
            json!("5.1"),
            json!({"feature1": 1}),
            json!([[[1.0]]]),
            json!([1.0, [2.0]]),
            json!(["a", "b"]),
        ] {
            let err = TabularInput::from_json(&value).unwrap_err();
            assert!(
                matches!(err, InferenceError::UnsupportedInput(_)),
                "{value} should be rejected"
            );
        }
    }
}
