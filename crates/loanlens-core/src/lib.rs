//! Core library for loan agreement extraction.
//!
//! This crate provides:
//! - Text acquisition from DOCX and PDF, with OCR for scanned PDFs
//! - Entity recognition with an ONNX token classification model
//! - Span trimming, value normalization and borrower recovery
//! - The extraction pipeline and Doccano-based evaluation

pub mod acquire;
pub mod annotations;
pub mod error;
pub mod fields;
pub mod models;
pub mod ner;
pub mod ocr;
pub mod pipeline;

pub use acquire::{Document, DocumentType, RawText, TextAcquirer, TextSource};
pub use error::{LoanLensError, Result};
pub use models::{
    EntitySpan, ExtractionResult, FieldKind, FieldOrigin, LoanLensConfig, LoanRecord,
    NormalizedField,
};
pub use ner::{EntityRecognizer, SpanSelection};
pub use ocr::{OcrResult, PageOcr, TextBox};
pub use pipeline::{assemble, Pipeline, PipelineBuilder};

#[cfg(feature = "native")]
pub use ner::OnnxEntityRecognizer;
#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;

/// Re-export inference types.
pub use loanlens_inference::{InferenceBackend, InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use loanlens_inference::OrtBackend;
