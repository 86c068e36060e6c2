//! Prediction dispatch by backend kind

use crate::config::AppConfig;
use crate::error::{InferenceError, Result};
use crate::feature_extractor::{image_pixels, IMAGE_PIXELS, IMAGE_SIDE};
use crate::models::handle::{lock_runtime, Backend, BackendKind, ModelHandle};
use crate::models::loader::ModelLoader;
use crate::models::pipeline::{Pipeline, Scaler, ScalerKind};
use crate::models::runtime::{InputTensor, TensorData, TensorDescriptor, TensorRuntime};
use crate::types::{LabelSet, PredictionResult, TabularInput};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info};

/// Single-model inference engine
///
/// Owns the loaded [`ModelHandle`] and branches every operation on its
/// backend kind.
pub struct InferenceEngine {
    handle: ModelHandle,
    labels: LabelSet,
}

impl InferenceEngine {
    /// Create a new inference engine from configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let loader = ModelLoader::with_threads(config.model.onnx_threads);
        let handle = loader.load(&config.model.path)?;
        let labels = LabelSet::new(config.model.labels.iter().cloned());

        info!(
            kind = %handle.kind(),
            labels = labels.len(),
            "Inference engine initialized"
        );

        Ok(Self::from_handle(handle, labels))
    }

    /// Create an inference engine around an already loaded model
    pub fn from_handle(handle: ModelHandle, labels: LabelSet) -> Self {
        Self { handle, labels }
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.handle
    }

    pub fn kind(&self) -> BackendKind {
        self.handle.kind()
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Predict from a feature row or a 2-D batch.
    ///
    /// Estimators return a label when they produce a single class index
    /// inside the label set and raw values otherwise. Networks return the
    /// argmax class per row.
    pub fn predict_tabular(&self, input: impl Into<TabularInput>) -> Result<PredictionResult> {
        let started = Instant::now();
        let batch = input.into().into_batch()?;
        let (rows, cols) = batch.dim();

        let result = match self.handle.backend() {
            Backend::TabularEstimator(estimator) => {
                let raw = estimator.predict(batch.view())?;
                label_predictions(raw, &self.labels)
            }
            Backend::KerasNetwork(runtime) | Backend::LiteInterpreter(runtime) => {
                let values: Vec<f32> = batch.iter().map(|&v| v as f32).collect();
                run_network(runtime, &values, |_| vec![rows as i64, cols as i64])?
            }
        };

        debug!(
            kind = %self.kind(),
            rows,
            cols,
            elapsed_us = started.elapsed().as_micros() as u64,
            "Tabular prediction complete"
        );

        Ok(result)
    }

    /// Predict the class of an encoded image.
    ///
    /// Only network backends accept images.
    pub fn predict_image(&self, bytes: &[u8]) -> Result<PredictionResult> {
        let started = Instant::now();

        let result = match self.handle.backend() {
            Backend::TabularEstimator(_) => {
                return Err(InferenceError::UnsupportedModelType {
                    kind: BackendKind::TabularEstimator,
                    operation: "predict_image",
                })
            }
            Backend::KerasNetwork(runtime) => {
                let pixels = image_pixels(bytes)?;
                run_network(runtime, &pixels, |_| vec![1, IMAGE_PIXELS as i64])?
            }
            Backend::LiteInterpreter(runtime) => {
                let pixels = image_pixels(bytes)?;
                run_network(runtime, &pixels, interpreter_image_shape)?
            }
        };

        debug!(
            kind = %self.kind(),
            bytes = bytes.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Image prediction complete"
        );

        Ok(result)
    }

    /// Fraction of test rows whose prediction equals the expected value.
    pub fn evaluate_accuracy(&self, x_test: &[Vec<f64>], y_test: &[f64]) -> Result<f64> {
        let estimator = match self.handle.backend() {
            Backend::TabularEstimator(estimator) => estimator,
            Backend::KerasNetwork(_) | Backend::LiteInterpreter(_) => {
                return Err(InferenceError::UnsupportedModelType {
                    kind: self.kind(),
                    operation: "evaluate_accuracy",
                })
            }
        };

        if x_test.is_empty() {
            return Err(InferenceError::UnsupportedInput("test set is empty".to_string()));
        }
        if x_test.len() != y_test.len() {
            return Err(InferenceError::UnsupportedInput(format!(
                "{} test rows but {} expected values",
                x_test.len(),
                y_test.len()
            )));
        }

        let batch = TabularInput::Batch(x_test.to_vec()).into_batch()?;
        let predictions = estimator.predict(batch.view())?;
        let correct = predictions
            .iter()
            .zip(y_test)
            .filter(|(predicted, expected)| predicted == expected)
            .count();

        let accuracy = correct as f64 / y_test.len() as f64;
        debug!(samples = y_test.len(), correct, accuracy, "Accuracy evaluated");
        Ok(accuracy)
    }

    /// Build a scaling pipeline in front of the estimator.
    ///
    /// The scaler is fitted on `reference` for the given column indices;
    /// the remaining columns pass through. No columns means no scaling.
    pub fn data_pipeline(
        &self,
        numerical_features: &[usize],
        scaler: ScalerKind,
        reference: impl Into<TabularInput>,
    ) -> Result<Pipeline<'_>> {
        let estimator = match self.handle.backend() {
            Backend::TabularEstimator(estimator) => estimator,
            Backend::KerasNetwork(_) | Backend::LiteInterpreter(_) => {
                return Err(InferenceError::UnsupportedModelType {
                    kind: self.kind(),
                    operation: "data_pipeline",
                })
            }
        };

        let reference = reference.into().into_batch()?;
        if reference.ncols() != estimator.n_features() {
            return Err(InferenceError::UnsupportedInput(format!(
                "reference batch has {} features, model expects {}",
                reference.ncols(),
                estimator.n_features()
            )));
        }

        let fitted = Scaler::fit(scaler, numerical_features, &reference)?;
        debug!(scaler = %scaler, columns = ?numerical_features, "Pipeline fitted");
        Ok(Pipeline::new(fitted, estimator, &self.labels))
    }
}

/// Map raw estimator output to a prediction result.
///
/// A single integral class index inside the label set becomes its label;
/// anything else is returned unchanged.
pub(crate) fn label_predictions(raw: Vec<f64>, labels: &LabelSet) -> PredictionResult {
    if let [value] = raw.as_slice() {
        if let Some(label) = labels.lookup(*value) {
            return PredictionResult::Label(label.to_string());
        }
    }
    PredictionResult::Values(raw)
}

/// Image shape for the lite interpreter.
///
/// A fully static input slot holding exactly one image is used verbatim;
/// otherwise a leading batch axis is added to the 28×28 image.
fn interpreter_image_shape(input: &TensorDescriptor) -> Vec<i64> {
    match input.static_elements() {
        Some(n) if n == IMAGE_PIXELS => input.shape.clone(),
        _ => vec![1, IMAGE_SIDE as i64, IMAGE_SIDE as i64],
    }
}

/// One network pass: shape check, cast to the slot dtype, run, argmax.
fn run_network<F>(
    runtime: &Mutex<Box<dyn TensorRuntime>>,
    values: &[f32],
    shape_for: F,
) -> Result<PredictionResult>
where
    F: FnOnce(&TensorDescriptor) -> Vec<i64>,
{
    let mut runtime = lock_runtime(runtime)?;

    let shape = shape_for(runtime.input());
    runtime.input().check_shape(&shape)?;
    let data = TensorData::cast(values, runtime.input().dtype);

    let output = runtime.run(InputTensor { shape, data })?;
    Ok(PredictionResult::Classes(output.argmax_rows()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::estimator::Estimator;
    use crate::models::runtime::{ElementType, OutputTensor};
    use std::sync::Arc;

    /// Runtime that records its inputs and returns a fixed output
    struct FixedRuntime {
        input: TensorDescriptor,
        output: TensorDescriptor,
        scores: Vec<f32>,
        seen: Arc<Mutex<Vec<InputTensor>>>,
    }

    impl FixedRuntime {
        fn boxed(
            shape: Vec<i64>,
            dtype: ElementType,
            scores: Vec<f32>,
        ) -> (Box<dyn TensorRuntime>, Arc<Mutex<Vec<InputTensor>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let runtime = FixedRuntime {
                input: TensorDescriptor {
                    name: "input".to_string(),
                    index: 0,
                    dtype,
                    shape,
                },
                output: TensorDescriptor {
                    name: "output".to_string(),
                    index: 0,
                    dtype: ElementType::Float32,
                    shape: vec![-1, scores.len() as i64],
                },
                scores,
                seen: Arc::clone(&seen),
            };
            (Box::new(runtime), seen)
        }
    }

    impl TensorRuntime for FixedRuntime {
        fn input(&self) -> &TensorDescriptor {
            &self.input
        }

        fn output(&self) -> &TensorDescriptor {
            &self.output
        }

        fn run(&mut self, input: InputTensor) -> Result<OutputTensor> {
            let rows = input.shape.first().copied().unwrap_or(1).max(1);
            self.seen.lock().unwrap().push(input);
            let data: Vec<f32> = (0..rows).flat_map(|_| self.scores.clone()).collect();
            Ok(OutputTensor {
                shape: vec![rows, self.scores.len() as i64],
                data,
            })
        }
    }

    fn iris_engine() -> InferenceEngine {
        let estimator = Estimator::LinearClassifier {
            coefficients: vec![vec![-1.0, 2.0], vec![0.5, -0.5], vec![1.5, -1.5]],
            intercepts: vec![0.0, 0.0, -2.0],
        };
        InferenceEngine::from_handle(
            ModelHandle::estimator(estimator, "iris.json"),
            LabelSet::default(),
        )
    }

    fn white_png() -> Vec<u8> {
        let img = image::GrayImage::from_pixel(28, 28, image::Luma([255]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_single_row_maps_to_label() {
        let result = iris_engine().predict_tabular(vec![5.1, 3.5]).unwrap();
        assert_eq!(result, PredictionResult::Label("setosa".to_string()));
    }

    #[test]
    fn test_batch_returns_raw_values() {
        let result = iris_engine()
            .predict_tabular(vec![vec![5.1, 3.5], vec![6.0, 2.2]])
            .unwrap();
        assert_eq!(result, PredictionResult::Values(vec![0.0, 2.0]));
    }

    #[test]
    fn test_label_mapping_falls_back_to_values() {
        let labels = LabelSet::new(["only"]);
        assert_eq!(
            label_predictions(vec![3.0], &labels),
            PredictionResult::Values(vec![3.0])
        );
        assert_eq!(
            label_predictions(vec![0.25], &labels),
            PredictionResult::Values(vec![0.25])
        );
        assert_eq!(
            label_predictions(vec![0.0], &labels),
            PredictionResult::Label("only".to_string())
        );
    }

    #[test]
    fn test_predict_image_on_estimator_is_rejected() {
        let err = iris_engine().predict_image(&white_png()).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::UnsupportedModelType {
                kind: BackendKind::TabularEstimator,
                ..
            }
        ));
    }

    #[test]
    fn test_network_image_is_flattened() {
        let (runtime, seen) =
            FixedRuntime::boxed(vec![-1, 784], ElementType::Float32, vec![0.1, 0.9]);
        let engine = InferenceEngine::from_handle(
            ModelHandle::network(runtime, "mnist.onnx"),
            LabelSet::default(),
        );

        let result = engine.predict_image(&white_png()).unwrap();
        assert_eq!(result, PredictionResult::Classes(vec![1]));

        let inputs = seen.lock().unwrap();
        assert_eq!(inputs[0].shape, vec![1, 784]);
        assert_eq!(inputs[0].data.dtype(), ElementType::Float32);
    }

    #[test]
    fn test_interpreter_image_gets_batch_axis_and_cast() {
        let (runtime, seen) =
            FixedRuntime::boxed(vec![1, 28, 28], ElementType::Uint8, vec![0.2, 0.1, 0.7]);
        let engine = InferenceEngine::from_handle(
            ModelHandle::interpreter(runtime, "mnist.ort"),
            LabelSet::default(),
        );

        let result = engine.predict_image(&white_png()).unwrap();
        assert_eq!(result, PredictionResult::Classes(vec![2]));

        let inputs = seen.lock().unwrap();
        assert_eq!(inputs[0].shape, vec![1, 28, 28]);
        assert_eq!(inputs[0].data, TensorData::Uint8(vec![1; 784]));
    }

    #[test]
    fn test_interpreter_static_shape_used_verbatim() {
        let desc = TensorDescriptor {
            name: "input".to_string(),
            index: 0,
            dtype: ElementType::Float32,
            shape: vec![1, 28, 28, 1],
        };
        assert_eq!(interpreter_image_shape(&desc), vec![1, 28, 28, 1]);

        let dynamic = TensorDescriptor {
            shape: vec![-1, 28, 28],
            ..desc
        };
        assert_eq!(interpreter_image_shape(&dynamic), vec![1, 28, 28]);
    }

    #[test]
    fn test_network_shape_mismatch_is_unsupported_input() {
        let (runtime, seen) = FixedRuntime::boxed(vec![-1, 4], ElementType::Float32, vec![1.0]);
        let engine = InferenceEngine::from_handle(
            ModelHandle::network(runtime, "net.onnx"),
            LabelSet::default(),
        );

        let err = engine.predict_tabular(vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, InferenceError::UnsupportedInput(_)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_network_tabular_batch() {
        let (runtime, _) =
            FixedRuntime::boxed(vec![-1, 2], ElementType::Float32, vec![0.0, 0.3, 0.1]);
        let engine = InferenceEngine::from_handle(
            ModelHandle::network(runtime, "net.onnx"),
            LabelSet::default(),
        );

        let result = engine
            .predict_tabular(vec![vec![1.0, 2.0], vec![3.0, 4.0]])
            .unwrap();
        assert_eq!(result, PredictionResult::Classes(vec![1, 1]));
    }

    #[test]
    fn test_evaluate_accuracy() {
        let engine = iris_engine();
        let x = vec![vec![5.1, 3.5], vec![6.0, 2.2], vec![7.7, 2.6]];

        assert_eq!(engine.evaluate_accuracy(&x, &[0.0, 2.0, 2.0]).unwrap(), 1.0);
        assert_eq!(engine.evaluate_accuracy(&x, &[1.0, 1.0, 1.0]).unwrap(), 0.0);

        let third = engine.evaluate_accuracy(&x, &[0.0, 0.0, 0.0]).unwrap();
        assert!((third - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_accuracy_rejects_bad_sets() {
        let engine = iris_engine();
        assert!(matches!(
            engine.evaluate_accuracy(&[], &[]),
            Err(InferenceError::UnsupportedInput(_))
        ));
        assert!(matches!(
            engine.evaluate_accuracy(&[vec![1.0, 2.0]], &[0.0, 1.0]),
            Err(InferenceError::UnsupportedInput(_))
        ));
    }

    #[test]
    fn test_estimator_only_operations_on_network() {
        let (runtime, _) = FixedRuntime::boxed(vec![-1, 2], ElementType::Float32, vec![1.0]);
        let engine = InferenceEngine::from_handle(
            ModelHandle::interpreter(runtime, "net.ort"),
            LabelSet::default(),
        );

        let err = engine.evaluate_accuracy(&[vec![1.0, 2.0]], &[0.0]).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::UnsupportedModelType {
                kind: BackendKind::LiteInterpreter,
                operation: "evaluate_accuracy",
            }
        ));

        let err = engine
            .data_pipeline(&[0], ScalerKind::Standard, vec![1.0, 2.0])
            .unwrap_err();
        assert!(matches!(err, InferenceError::UnsupportedModelType { .. }));
    }

    #[test]
    fn test_data_pipeline_checks_reference_width() {
        let err = iris_engine()
            .data_pipeline(&[0], ScalerKind::MinMax, vec![1.0, 2.0, 3.0])
            .unwrap_err();
        assert!(matches!(err, InferenceError::UnsupportedInput(_)));
    }

    #[test]
    fn test_identity_pipeline_matches_engine() {
        let engine = iris_engine();
        let pipeline = engine
            .data_pipeline(&[], ScalerKind::Standard, vec![vec![5.1, 3.5], vec![6.0, 2.2]])
            .unwrap();
        assert_eq!(
            pipeline.predict(vec![5.1, 3.5]).unwrap(),
            engine.predict_tabular(vec![5.1, 3.5]).unwrap()
        );
    }
}
