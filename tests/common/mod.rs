//! Common test utilities for integration tests.

#![allow(dead_code)]

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use synapse_inference::models::{
    ElementType, Estimator, InputTensor, OutputTensor, TensorData, TensorDescriptor, TensorRuntime,
};
use synapse_inference::Result;

/// Linear iris classifier over (sepal length, sepal width).
///
/// `[5.1, 3.5]` is setosa, `[6.0, 2.2]` and `[7.7, 2.6]` are virginica.
pub fn iris_classifier() -> Estimator {
    Estimator::LinearClassifier {
        coefficients: vec![vec![-1.0, 2.0], vec![0.5, -0.5], vec![1.5, -1.5]],
        intercepts: vec![0.0, 0.0, -2.0],
    }
}

/// Save the iris classifier under `dir` with the given file name.
pub fn write_iris_model(dir: &Path, file_name: &str) -> PathBuf {
    let path = dir.join(file_name);
    iris_classifier().save(&path).expect("failed to save model");
    path
}

/// Encode a solid-color image.
pub fn solid_image(width: u32, height: u32, rgb: [u8; 3], format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(rgb));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).expect("failed to encode image");
    buf.into_inner()
}

/// Inputs seen by a [`FakeRuntime`]
pub type Seen = Arc<Mutex<Vec<InputTensor>>>;

/// Network stand-in: scores every row with class `index` = mean pixel bucket.
///
/// Returns 10 scores per row with the maximum at `round(mean * 9)`, so a
/// white image predicts 9 and a black image predicts 0.
pub struct FakeRuntime {
    input: TensorDescriptor,
    output: TensorDescriptor,
    seen: Seen,
}

impl FakeRuntime {
    pub fn new(shape: Vec<i64>, dtype: ElementType) -> (Box<dyn TensorRuntime>, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let runtime = FakeRuntime {
            input: TensorDescriptor {
                name: "input".to_string(),
                index: 0,
                dtype,
                shape,
            },
            output: TensorDescriptor {
                name: "scores".to_string(),
                index: 0,
                dtype: ElementType::Float32,
                shape: vec![-1, 10],
            },
            seen: Arc::clone(&seen),
        };
        (Box::new(runtime), seen)
    }
}

impl TensorRuntime for FakeRuntime {
    fn input(&self) -> &TensorDescriptor {
        &self.input
    }

    fn output(&self) -> &TensorDescriptor {
        &self.output
    }

    fn run(&mut self, input: InputTensor) -> Result<OutputTensor> {
        let values: Vec<f32> = match &input.data {
            TensorData::Float32(v) => v.clone(),
            TensorData::Float64(v) => v.iter().map(|&x| x as f32).collect(),
            TensorData::Uint8(v) => v.iter().map(|&x| x as f32).collect(),
            other => panic!("unexpected input type {:?}", other.dtype()),
        };

        let rows = input.shape.first().copied().unwrap_or(1).max(1) as usize;
        let width = values.len() / rows;
        let mut data = Vec::with_capacity(rows * 10);
        for row in values.chunks(width) {
            let mean = row.iter().sum::<f32>() / row.len() as f32;
            let class = (mean.clamp(0.0, 1.0) * 9.0).round() as usize;
            data.extend((0..10).map(|i| if i == class { 1.0 } else { 0.0 }));
        }

        self.seen.lock().unwrap().push(input);
        Ok(OutputTensor {
            shape: vec![rows as i64, 10],
            data,
        })
    }
}
