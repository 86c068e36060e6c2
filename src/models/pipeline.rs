//! Column scaling in front of a tabular estimator
//!
//! A [`Pipeline`] scales a chosen subset of columns and passes the remaining
//! columns through untouched, in their original positions, before handing the
//! batch to the estimator.

use crate::error::{InferenceError, Result};
use crate::models::estimator::Estimator;
use crate::models::inference::label_predictions;
use crate::types::{LabelSet, PredictionResult, TabularInput};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scaling strategy for numerical columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalerKind {
    /// Zero mean, unit variance
    #[default]
    Standard,
    /// Rescale into `[0, 1]`
    MinMax,
}

impl FromStr for ScalerKind {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standard" => Ok(ScalerKind::Standard),
            "minmax" => Ok(ScalerKind::MinMax),
            other => Err(InferenceError::UnsupportedScaler(other.to_string())),
        }
    }
}

impl fmt::Display for ScalerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalerKind::Standard => f.write_str("standard"),
            ScalerKind::MinMax => f.write_str("minmax"),
        }
    }
}

/// Per-column affine transform `(x - offset) / scale`
#[derive(Debug, Clone, PartialEq)]
struct ColumnScale {
    column: usize,
    offset: f64,
    scale: f64,
}

impl ColumnScale {
    fn fit(kind: ScalerKind, column: usize, values: ArrayView1<'_, f64>) -> Self {
        let n = values.len() as f64;
        let (offset, spread) = match kind {
            ScalerKind::Standard => {
                let mean = values.sum() / n;
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                (mean, variance.sqrt())
            }
            ScalerKind::MinMax => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (min, max - min)
            }
        };

        // constant columns are only shifted
        let scale = if spread == 0.0 || !spread.is_finite() {
            1.0
        } else {
            spread
        };

        Self {
            column,
            offset,
            scale,
        }
    }
}

/// Scaler fitted on a reference batch
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    kind: ScalerKind,
    columns: Vec<ColumnScale>,
    width: usize,
}

impl Scaler {
    /// Fit `kind` on the given columns of `reference`.
    ///
    /// An empty column list produces the identity transform.
    pub fn fit(kind: ScalerKind, columns: &[usize], reference: &Array2<f64>) -> Result<Self> {
        let width = reference.ncols();
        if let Some(&bad) = columns.iter().find(|&&c| c >= width) {
            return Err(InferenceError::UnsupportedInput(format!(
                "column {} is out of range for {} features",
                bad, width
            )));
        }

        if let Some((i, &dup)) = columns
            .iter()
            .enumerate()
            .find(|(i, c)| columns[..*i].contains(c))
        {
            return Err(InferenceError::UnsupportedInput(format!(
                "column {} is listed more than once (position {})",
                dup, i
            )));
        }

        let columns = columns
            .iter()
            .map(|&c| ColumnScale::fit(kind, c, reference.column(c)))
            .collect();

        Ok(Self {
            kind,
            columns,
            width,
        })
    }

    pub fn kind(&self) -> ScalerKind {
        self.kind
    }

    pub fn is_identity(&self) -> bool {
        self.columns.is_empty()
    }

    /// Scale the fitted columns of `batch` in place.
    pub fn transform(&self, mut batch: Array2<f64>) -> Result<Array2<f64>> {
        if batch.ncols() != self.width {
            return Err(InferenceError::UnsupportedInput(format!(
                "pipeline was fitted on {} features, got {}",
                self.width,
                batch.ncols()
            )));
        }

        for c in &self.columns {
            batch
                .column_mut(c.column)
                .mapv_inplace(|x| (x - c.offset) / c.scale);
        }
        Ok(batch)
    }
}

/// Fitted scaler followed by a tabular estimator
#[derive(Debug, Clone)]
pub struct Pipeline<'a> {
    scaler: Scaler,
    estimator: &'a Estimator,
    labels: &'a LabelSet,
}

impl<'a> Pipeline<'a> {
    pub(crate) fn new(scaler: Scaler, estimator: &'a Estimator, labels: &'a LabelSet) -> Self {
        Self {
            scaler,
            estimator,
            labels,
        }
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    /// Scale then predict.
    pub fn predict(&self, input: impl Into<TabularInput>) -> Result<PredictionResult> {
        let batch = self.scaler.transform(input.into().into_batch()?)?;
        let raw = self.estimator.predict(batch.view())?;
        Ok(label_predictions(raw, self.labels))
    }
}
