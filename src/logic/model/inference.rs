//! Inference Engine - ONNX Runtime Integration
//!
//! Model seams used by the cascade plus their ONNX implementations.
//! The cascade only sees the traits; tests plug in their own models.

use std::path::Path;

use ndarray::{Array2, Array3};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use thiserror::Error;

use super::artifacts::ArtifactError;

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model runtime error: {0}")]
    Runtime(String),

    #[error("model expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("model produced no output")]
    EmptyOutput,

    #[error("class index {0} is not known to the label decoder")]
    UnknownClass(i64),

    #[error("{0} is not loaded")]
    NotLoaded(&'static str),
}

// ============================================================================
// MODEL TRAITS
// ============================================================================

/// Stage-1 model: multiclass classifier over the 78-vector
pub trait Classifier: Send + Sync {
    /// Predicted class index for one (already scaled) input row
    fn predict_class(&self, input: &[f32]) -> Result<i64, InferenceError>;
}

/// Stage-2 model: reconstructs its input; large error means abnormal
pub trait Reconstructor: Send + Sync {
    fn reconstruct(&self, input: &[f32]) -> Result<Vec<f32>, InferenceError>;
}

/// Mean squared difference between a model input and its reconstruction
pub fn reconstruction_error(input: &[f32], output: &[f32]) -> Result<f64, InferenceError> {
    if input.len() != output.len() {
        return Err(InferenceError::DimensionMismatch {
            expected: input.len(),
            actual: output.len(),
        });
    }
    if input.is_empty() {
        return Err(InferenceError::EmptyOutput);
    }

    let sum: f64 = input
        .iter()
        .zip(output)
        .map(|(&x, &y)| {
            let diff = f64::from(x) - f64::from(y);
            diff * diff
        })
        .sum();

    Ok(sum / input.len() as f64)
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

/// Open an ONNX Runtime session for an artifact
pub fn open_session(path: &Path) -> Result<Session, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::Missing(path.to_path_buf()));
    }

    Session::builder()
        .map_err(|e| model_error(path, e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| model_error(path, e))?
        .commit_from_file(path)
        .map_err(|e| model_error(path, e))
}

fn model_error(path: &Path, e: impl std::fmt::Display) -> ArtifactError {
    ArtifactError::Model {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// First output name; read before `run` to avoid a borrow conflict
fn first_output_name(session: &Session) -> Result<String, InferenceError> {
    session
        .outputs
        .first()
        .map(|o| o.name.clone())
        .ok_or(InferenceError::EmptyOutput)
}

fn runtime(e: impl std::fmt::Display) -> InferenceError {
    InferenceError::Runtime(e.to_string())
}

/// Multiclass classifier exported to ONNX.
///
/// Accepts either an integer label output or a per-class score output
/// (argmax is taken).
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_len: usize,
}

impl OnnxClassifier {
    pub fn load(path: &Path, input_len: usize) -> Result<Self, ArtifactError> {
        let session = open_session(path)?;
        log::info!("ONNX classifier loaded from: {}", path.display());

        Ok(Self {
            session: Mutex::new(session),
            input_len,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn predict_class(&self, input: &[f32]) -> Result<i64, InferenceError> {
        if input.len() != self.input_len {
            return Err(InferenceError::DimensionMismatch {
                expected: self.input_len,
                actual: input.len(),
            });
        }

        let input_array = Array2::<f32>::from_shape_vec((1, input.len()), input.to_vec())
            .map_err(runtime)?;

        let mut session = self.session.lock();
        let output_name = first_output_name(&session)?;

        let input_tensor = Value::from_array(input_array).map_err(runtime)?;
        let outputs = session.run(ort::inputs![input_tensor]).map_err(runtime)?;
        let output = outputs.get(&output_name).ok_or(InferenceError::EmptyOutput)?;

        if let Ok((_, labels)) = output.try_extract_tensor::<i64>() {
            return labels.first().copied().ok_or(InferenceError::EmptyOutput);
        }

        let (_, scores) = output.try_extract_tensor::<f32>().map_err(runtime)?;
        match scores {
            [] => Err(InferenceError::EmptyOutput),
            [label] => Ok(label.round() as i64),
            _ => Ok(argmax(scores) as i64),
        }
    }
}

fn argmax(scores: &[f32]) -> usize {
    scores
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_i, best), (i, &s)| {
            if s > best {
                (i, s)
            } else {
                (best_i, best)
            }
        })
        .0
}

/// Sequence autoencoder exported to ONNX; one flow is fed as a
/// `(1, 1, features)` sequence.
pub struct OnnxAutoencoder {
    session: Mutex<Session>,
}

impl OnnxAutoencoder {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let session = open_session(path)?;
        log::info!("ONNX autoencoder loaded from: {}", path.display());

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl Reconstructor for OnnxAutoencoder {
    fn reconstruct(&self, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        let input_array = Array3::<f32>::from_shape_vec((1, 1, input.len()), input.to_vec())
            .map_err(runtime)?;

        let mut session = self.session.lock();
        let output_name = first_output_name(&session)?;

        let input_tensor = Value::from_array(input_array).map_err(runtime)?;
        let outputs = session.run(ort::inputs![input_tensor]).map_err(runtime)?;
        let output = outputs.get(&output_name).ok_or(InferenceError::EmptyOutput)?;

        let (_, data) = output.try_extract_tensor::<f32>().map_err(runtime)?;
        Ok(data.to_vec())
    }
}
