//! Tensor runtime abstraction shared by the network backends
//!
//! A [`TensorRuntime`] owns a native inference session. It reports the
//! descriptors of its first input and output slot and runs one pass over a
//! typed input tensor, returning the output as `f32` values.

use crate::error::{InferenceError, Result};
use serde::Serialize;
use std::fmt;

/// Element types the dispatcher can bind to an input slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Float32,
    Float64,
    Uint8,
    Int8,
    Int32,
    Int64,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
            ElementType::Uint8 => "uint8",
            ElementType::Int8 => "int8",
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
        };
        f.write_str(name)
    }
}

/// Runtime-reported metadata for one input or output slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TensorDescriptor {
    /// Slot name in the graph
    pub name: String,
    /// Position among the session's inputs or outputs
    pub index: usize,
    /// Declared element type
    pub dtype: ElementType,
    /// Declared shape, `-1` for dynamic dimensions
    pub shape: Vec<i64>,
}

impl TensorDescriptor {
    /// Element count when every dimension is static.
    pub fn static_elements(&self) -> Option<usize> {
        if self.shape.iter().any(|&d| d < 0) {
            return None;
        }
        Some(self.shape.iter().product::<i64>() as usize)
    }

    /// Check that a concrete shape fits this slot.
    ///
    /// Rank must match and every static dimension must be equal.
    pub fn check_shape(&self, shape: &[i64]) -> Result<()> {
        let fits = shape.len() == self.shape.len()
            && self
                .shape
                .iter()
                .zip(shape)
                .all(|(&declared, &actual)| declared < 0 || declared == actual);

        if fits {
            Ok(())
        } else {
            Err(InferenceError::UnsupportedInput(format!(
                "input '{}' expects shape {:?}, got {:?}",
                self.name, self.shape, shape
            )))
        }
    }
}

/// Typed tensor payload
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Uint8(Vec<u8>),
    Int8(Vec<i8>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
}

impl TensorData {
    /// Cast normalized values to `dtype`.
    ///
    /// Integer targets truncate toward zero and saturate at the type bounds.
    pub fn cast(values: &[f32], dtype: ElementType) -> Self {
        match dtype {
            ElementType::Float32 => TensorData::Float32(values.to_vec()),
            ElementType::Float64 => TensorData::Float64(values.iter().map(|&v| v as f64).collect()),
            ElementType::Uint8 => TensorData::Uint8(values.iter().map(|&v| v as u8).collect()),
            ElementType::Int8 => TensorData::Int8(values.iter().map(|&v| v as i8).collect()),
            ElementType::Int32 => TensorData::Int32(values.iter().map(|&v| v as i32).collect()),
            ElementType::Int64 => TensorData::Int64(values.iter().map(|&v| v as i64).collect()),
        }
    }

    pub fn dtype(&self) -> ElementType {
        match self {
            TensorData::Float32(_) => ElementType::Float32,
            TensorData::Float64(_) => ElementType::Float64,
            TensorData::Uint8(_) => ElementType::Uint8,
            TensorData::Int8(_) => ElementType::Int8,
            TensorData::Int32(_) => ElementType::Int32,
            TensorData::Int64(_) => ElementType::Int64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::Float32(v) => v.len(),
            TensorData::Float64(v) => v.len(),
            TensorData::Uint8(v) => v.len(),
            TensorData::Int8(v) => v.len(),
            TensorData::Int32(v) => v.len(),
            TensorData::Int64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Input tensor ready to be bound to a slot
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    pub shape: Vec<i64>,
    pub data: TensorData,
}

/// Output tensor read back from a slot
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
    pub shape: Vec<i64>,
    pub data: Vec<f32>,
}

impl OutputTensor {
    /// Reduce each row to the index of its highest score.
    ///
    /// Rank 0/1 outputs are a single row. For higher ranks the leading axis
    /// is the batch and the remaining axes are flattened into classes.
    pub fn argmax_rows(&self) -> Result<Vec<usize>> {
        if self.data.is_empty() {
            return Err(InferenceError::Runtime("model returned an empty output".to_string()));
        }

        let rows = match self.shape.first() {
            Some(&n) if self.shape.len() > 1 && n > 0 => n as usize,
            _ => 1,
        };
        if self.data.len() % rows != 0 {
            return Err(InferenceError::Runtime(format!(
                "output of {} values does not split into {} rows",
                self.data.len(),
                rows
            )));
        }

        let width = self.data.len() / rows;
        Ok(self.data.chunks(width).map(argmax).collect())
    }
}

/// Index of the first maximum. NaN never wins.
pub(crate) fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] || (values[best].is_nan() && !v.is_nan()) {
            best = i;
        }
    }
    best
}

/// A loaded inference session with one input and one output slot in use.
///
/// `run` takes `&mut self`; callers serialize access, typically through the
/// mutex held by the model handle.
pub trait TensorRuntime: Send {
    /// Descriptor of the first input slot.
    fn input(&self) -> &TensorDescriptor;

    /// Descriptor of the first output slot.
    fn output(&self) -> &TensorDescriptor;

    /// Run one inference pass.
    fn run(&mut self, input: InputTensor) -> Result<OutputTensor>;
}
