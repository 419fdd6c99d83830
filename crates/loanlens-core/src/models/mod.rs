//! Data models for loan agreement extraction.

pub mod agreement;
pub mod config;

pub use agreement::{EntitySpan, ExtractionResult, FieldKind, FieldOrigin, LoanRecord, NormalizedField};
pub use config::{LoanLensConfig, ModelConfig, NerConfig, OcrConfig, PdfConfig, UnknownLabelPolicy};
