//! Tensor types for inference input/output.

use ndarray::{ArrayD, IxDyn};

use crate::{InferenceError, Result};

/// Input tensor for inference.
///
/// Token classification models take `int64` ids and masks.
#[derive(Debug, Clone)]
pub enum InputTensor {
    Int64(ArrayD<i64>),
}

impl InputTensor {
    /// Get the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        match self {
            InputTensor::Int64(arr) => arr.shape(),
        }
    }

    /// Create an Int64 tensor from raw data and shape.
    pub fn from_i64(data: Vec<i64>, shape: Vec<usize>) -> Result<Self> {
        let arr = ArrayD::from_shape_vec(IxDyn(&shape), data)
            .map_err(|e| InferenceError::InvalidInput(e.to_string()))?;
        Ok(InputTensor::Int64(arr))
    }

    /// Create a `[1, len]` Int64 batch holding a single token sequence.
    pub fn token_row(values: Vec<i64>) -> Result<Self> {
        let len = values.len();
        Self::from_i64(values, vec![1, len])
    }
}

/// Output tensor from inference.
#[derive(Debug, Clone)]
pub enum OutputTensor {
    Float32(ArrayD<f32>),
    Int64(ArrayD<i64>),
}

impl OutputTensor {
    /// Get the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        match self {
            OutputTensor::Float32(arr) => arr.shape(),
            OutputTensor::Int64(arr) => arr.shape(),
        }
    }

    /// Try to get the inner Float32 array.
    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            OutputTensor::Float32(arr) => Some(arr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_token_row_shape() {
        let tensor = InputTensor::token_row(vec![101, 2054, 102]).unwrap();
        assert_eq!(tensor.shape(), &[1, 3]);
    }

    #[test]
    fn test_from_i64_rejects_bad_shape() {
        let err = InputTensor::from_i64(vec![1, 2, 3], vec![2, 2]).unwrap_err();
        assert!(matches!(err, InferenceError::InvalidInput(_)));
    }

    #[test]
    fn test_output_as_f32() {
        let arr = ArrayD::from_shape_vec(IxDyn(&[1, 2]), vec![0.5f32, 1.5]).unwrap();
        let out = OutputTensor::Float32(arr);
        assert_eq!(out.shape(), &[1, 2]);
        assert_eq!(out.as_f32().map(|a| a.len()), Some(2));

        let ids = OutputTensor::Int64(ArrayD::from_shape_vec(IxDyn(&[1]), vec![7i64]).unwrap());
        assert!(ids.as_f32().is_none());
    }
}
