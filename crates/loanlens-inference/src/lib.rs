//! ONNX inference abstraction layer for loanlens.
//!
//! The entity recognizer talks to models through [`InferenceBackend`], so the
//! pipeline can run against ONNX Runtime in production and against in-memory
//! fakes in tests.

mod backend;
mod error;
mod tensor;

pub use backend::InferenceBackend;
pub use error::InferenceError;
pub use tensor::{InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use backend::ort::{OrtBackend, OrtOptions};

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
