//! Error types for the loanlens-core library.

use thiserror::Error;

/// Main error type for the loanlens library.
#[derive(Error, Debug)]
pub enum LoanLensError {
    /// The file extension is neither PDF nor DOCX.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Text could not be obtained from a supported document.
    #[error("acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// Entity recognizer error (model load or inference).
    #[error("entity recognition failed: {0}")]
    Ner(#[from] NerError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed annotation file.
    #[error("invalid annotations: {0}")]
    Annotations(String),

    /// I/O error outside document acquisition.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoanLensError {
    /// Whether this error came from reading the document rather than from
    /// its format or the recognizer.
    pub fn is_acquisition_failure(&self) -> bool {
        matches!(self, LoanLensError::Acquisition(_))
    }
}

/// Failures while turning a supported document into text.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// DOCX processing error.
    #[error("DOCX error: {0}")]
    Docx(#[from] DocxError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// The PDF has no text layer and no OCR engine is configured.
    #[error("PDF has no text layer and no OCR engine is available")]
    OcrUnavailable,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// No page image could be decoded for OCR.
    #[error("failed to extract page images: {0}")]
    ImageExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors related to DOCX processing.
#[derive(Error, Debug)]
pub enum DocxError {
    /// The file is not a readable ZIP container.
    #[error("invalid DOCX container: {0}")]
    Archive(String),

    /// The container has no main document part.
    #[error("missing document part: {0}")]
    MissingPart(&'static str),

    /// The main document part is not well-formed XML.
    #[error("malformed document XML: {0}")]
    Xml(String),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text detection or recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Errors related to the entity recognizer.
#[derive(Error, Debug)]
pub enum NerError {
    /// Failed to load the model, tokenizer or label configuration.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The model emits a label outside the known field kinds.
    #[error("model label '{0}' is not a known field kind")]
    UnknownLabel(String),

    /// Tokenization failed.
    #[error("tokenization failed: {0}")]
    Tokenize(String),

    /// The model produced output of an unexpected shape or type.
    #[error("unexpected model output: {0}")]
    Output(String),

    /// Inference error from the inference layer.
    #[error("inference error: {0}")]
    Inference(#[from] loanlens_inference::InferenceError),
}

/// Result type for the loanlens library.
pub type Result<T> = std::result::Result<T, LoanLensError>;
