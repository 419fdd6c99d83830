//! Inference backend implementations.

#[cfg(feature = "native")]
pub mod ort;

use crate::{InputTensor, OutputTensor, Result};

/// Trait for ONNX inference backends.
///
/// Backends are loaded once and shared read-only between extraction calls,
/// hence the `Send + Sync` bound. Implementations that wrap a non-reentrant
/// session serialize access internally.
pub trait InferenceBackend: Send + Sync {
    /// Run inference with the given named inputs and return named outputs in
    /// the order the model declares them.
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>>;

    /// Get the input names expected by the model.
    fn input_names(&self) -> &[String];

    /// Get the output names produced by the model.
    fn output_names(&self) -> &[String];

    /// Whether the model declares an input with the given name.
    fn has_input(&self, name: &str) -> bool {
        self.input_names().iter().any(|n| n == name)
    }
}
