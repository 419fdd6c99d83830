//! Inference layer errors.

use thiserror::Error;

/// Failures while loading or running an ONNX model.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// The model bytes could not be turned into a session.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Session builder rejected an option or execution provider.
    #[error("failed to create session: {0}")]
    SessionCreate(String),

    /// Input data does not match the declared tensor shape.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model has no {kind} named '{name}'")]
    MissingTensor { kind: &'static str, name: String },

    /// `Session::run` failed or the session lock was poisoned.
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    /// An output could not be read as a tensor of the expected type.
    #[error("failed to extract output: {0}")]
    OutputExtraction(String),

    /// Model file could not be read.
    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),
}
