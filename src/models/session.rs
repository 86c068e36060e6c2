//! ONNX Runtime sessions for the network backends

use crate::error::{InferenceError, Result};
use crate::models::runtime::{
    ElementType, InputTensor, OutputTensor, TensorData, TensorDescriptor, TensorRuntime,
};
use ort::io_binding::IoBinding;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::tensor::TensorElementType;
use ort::value::{DynTensor, DynValue, Tensor, ValueType};
use std::sync::OnceLock;
use tracing::{debug, info};

static ORT_ENVIRONMENT: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Initialize the process-wide ONNX Runtime environment once.
fn ensure_environment() -> Result<()> {
    ORT_ENVIRONMENT
        .get_or_init(|| {
            ort::init()
                .with_name("synapse-inference")
                .commit()
                .map(|_| info!("ONNX Runtime initialized"))
                .map_err(|e| e.to_string())
        })
        .clone()
        .map_err(InferenceError::Runtime)
}

/// Saved network loaded from an `.onnx` graph
pub struct OnnxNetwork {
    session: Session,
    input: TensorDescriptor,
    output: TensorDescriptor,
}

impl OnnxNetwork {
    /// Build a fully optimized session from ONNX bytes.
    pub fn from_bytes(bytes: &[u8], onnx_threads: usize) -> Result<Self> {
        ensure_environment()?;

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(onnx_threads)?
            .commit_from_memory(bytes)?;

        let (input, output) = describe(&session)?;
        Ok(Self {
            session,
            input,
            output,
        })
    }
}

impl TensorRuntime for OnnxNetwork {
    fn input(&self) -> &TensorDescriptor {
        &self.input
    }

    fn output(&self) -> &TensorDescriptor {
        &self.output
    }

    fn run(&mut self, input: InputTensor) -> Result<OutputTensor> {
        let tensor = to_ort_tensor(input)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input.name.as_str() => tensor])?;

        read_output(&outputs, &self.output)
    }
}

/// Lite network loaded from an ORT-format (`.ort`) model
///
/// Construction allocates the execution buffers: an I/O binding whose output
/// slot is bound to the session allocator. The binding lives as long as the
/// interpreter and is reused by every run; only the input is re-bound.
pub struct LiteInterpreter {
    session: Session,
    binding: IoBinding,
    input: TensorDescriptor,
    output: TensorDescriptor,
}

impl LiteInterpreter {
    /// Build a session from ORT-format bytes and allocate its buffers.
    pub fn from_bytes(bytes: &[u8], onnx_threads: usize) -> Result<Self> {
        ensure_environment()?;

        let session = Session::builder()?
            .with_config_entry("session.load_model_format", "ORT")?
            .with_optimization_level(GraphOptimizationLevel::Disable)?
            .with_intra_threads(onnx_threads)?
            .commit_from_memory(bytes)?;

        let (input, output) = describe(&session)?;
        Self::allocate(session, input, output)
    }

    fn allocate(
        session: Session,
        input: TensorDescriptor,
        output: TensorDescriptor,
    ) -> Result<Self> {
        let mut binding = session.create_binding()?;
        binding.bind_output_to_device(output.name.as_str(), &session.allocator().memory_info())?;

        debug!(output = %output.name, "Interpreter buffers allocated");

        Ok(Self {
            session,
            binding,
            input,
            output,
        })
    }
}

impl TensorRuntime for LiteInterpreter {
    fn input(&self) -> &TensorDescriptor {
        &self.input
    }

    fn output(&self) -> &TensorDescriptor {
        &self.output
    }

    fn run(&mut self, input: InputTensor) -> Result<OutputTensor> {
        let tensor = to_ort_tensor(input)?;
        self.binding.bind_input(self.input.name.as_str(), &tensor)?;

        let outputs = self.session.run_binding(&self.binding)?;
        read_output(&outputs, &self.output)
    }
}

/// Read the first input and output descriptors of a session.
fn describe(session: &Session) -> Result<(TensorDescriptor, TensorDescriptor)> {
    let input = session
        .inputs
        .first()
        .ok_or_else(|| InferenceError::Runtime("model declares no inputs".to_string()))
        .and_then(|i| descriptor(&i.name, 0, &i.input_type))?;

    let output = session
        .outputs
        .first()
        .ok_or_else(|| InferenceError::Runtime("model declares no outputs".to_string()))
        .and_then(|o| descriptor(&o.name, 0, &o.output_type))?;

    Ok((input, output))
}

fn descriptor(name: &str, index: usize, value_type: &ValueType) -> Result<TensorDescriptor> {
    let unsupported = || {
        InferenceError::Runtime(format!(
            "slot '{}' has unsupported type {:?}",
            name, value_type
        ))
    };

    let dtype = match value_type.tensor_type().ok_or_else(unsupported)? {
        TensorElementType::Float32 => ElementType::Float32,
        TensorElementType::Float64 => ElementType::Float64,
        TensorElementType::Uint8 => ElementType::Uint8,
        TensorElementType::Int8 => ElementType::Int8,
        TensorElementType::Int32 => ElementType::Int32,
        TensorElementType::Int64 => ElementType::Int64,
        _ => return Err(unsupported()),
    };

    let shape = value_type
        .tensor_shape()
        .map(|s| s.iter().copied().collect())
        .unwrap_or_default();

    Ok(TensorDescriptor {
        name: name.to_string(),
        index,
        dtype,
        shape,
    })
}

fn to_ort_tensor(input: InputTensor) -> Result<DynTensor> {
    let shape = input.shape;
    let tensor = match input.data {
        TensorData::Float32(v) => Tensor::<f32>::from_array((shape, v))?.upcast(),
        TensorData::Float64(v) => Tensor::<f64>::from_array((shape, v))?.upcast(),
        TensorData::Uint8(v) => Tensor::<u8>::from_array((shape, v))?.upcast(),
        TensorData::Int8(v) => Tensor::<i8>::from_array((shape, v))?.upcast(),
        TensorData::Int32(v) => Tensor::<i32>::from_array((shape, v))?.upcast(),
        TensorData::Int64(v) => Tensor::<i64>::from_array((shape, v))?.upcast(),
    };
    Ok(tensor)
}

fn read_output(outputs: &SessionOutputs<'_>, slot: &TensorDescriptor) -> Result<OutputTensor> {
    let value = outputs.get(slot.name.as_str()).ok_or_else(|| {
        InferenceError::Runtime(format!("output '{}' missing from results", slot.name))
    })?;

    match slot.dtype {
        ElementType::Float32 => extract(value, |v: &f32| *v),
        ElementType::Float64 => extract(value, |v: &f64| *v as f32),
        ElementType::Uint8 => extract(value, |v: &u8| *v as f32),
        ElementType::Int8 => extract(value, |v: &i8| *v as f32),
        ElementType::Int32 => extract(value, |v: &i32| *v as f32),
        ElementType::Int64 => extract(value, |v: &i64| *v as f32),
    }
}

fn extract<T, F>(value: &DynValue, convert: F) -> Result<OutputTensor>
where
    T: ort::tensor::PrimitiveTensorElementType,
    F: Fn(&T) -> f32,
{
    let (shape, data) = value.try_extract_tensor::<T>()?;
    Ok(OutputTensor {
        shape: shape.iter().copied().collect(),
        data: data.iter().map(convert).collect(),
    })
}
