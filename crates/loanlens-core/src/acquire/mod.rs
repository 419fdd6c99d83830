//! Text acquisition: DOCX body text, PDF text layer, OCR fallback.

pub mod docx;
pub mod pdf;

pub use pdf::PdfExtractor;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AcquisitionError, LoanLensError, PdfError, Result};
use crate::models::PdfConfig;
use crate::ocr::PageOcr;

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Pdf,
    Docx,
}

impl DocumentType {
    /// Format for a file extension, case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }
}

/// An input document whose format is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub doc_type: DocumentType,
}

impl Document {
    /// Classify a path by its extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();

        let doc_type = DocumentType::from_extension(&ext).ok_or_else(|| {
            LoanLensError::UnsupportedFormat(if ext.is_empty() {
                path.display().to_string()
            } else {
                format!(".{}", ext)
            })
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            doc_type,
        })
    }
}

/// Where acquired text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    Docx,
    PdfTextLayer,
    PdfOcr,
}

/// Plain text of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawText {
    pub text: String,
    pub source: TextSource,
}

impl RawText {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Turns supported documents into plain text.
#[derive(Clone)]
pub struct TextAcquirer {
    config: PdfConfig,
    ocr: Option<Arc<dyn PageOcr>>,
}

impl TextAcquirer {
    /// An acquirer without OCR; image-only PDFs fail with
    /// [`AcquisitionError::OcrUnavailable`] unless OCR fallback is disabled.
    pub fn new(config: PdfConfig) -> Self {
        Self { config, ocr: None }
    }

    /// Use `ocr` for PDFs without a text layer.
    pub fn with_ocr(mut self, ocr: Arc<dyn PageOcr>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    /// Acquire the text of the file at `path`.
    pub fn acquire(&self, path: impl AsRef<Path>) -> Result<RawText> {
        let document = Document::from_path(path)?;
        Ok(self.acquire_document(&document)?)
    }

    /// Acquire the text of a classified document.
    pub fn acquire_document(&self, document: &Document) -> std::result::Result<RawText, AcquisitionError> {
        debug!("Acquiring text from {}", document.path.display());
        match document.doc_type {
            DocumentType::Docx => {
                let file = BufReader::new(File::open(&document.path)?);
                let text = docx::extract_text(file)?;
                Ok(RawText {
                    text,
                    source: TextSource::Docx,
                })
            }
            DocumentType::Pdf => {
                let data = std::fs::read(&document.path)?;
                self.acquire_pdf(&data)
            }
        }
    }

    /// Acquire the text of an in-memory PDF.
    pub fn acquire_pdf(&self, data: &[u8]) -> std::result::Result<RawText, AcquisitionError> {
        let pdf = PdfExtractor::load(data)?;

        let text = match pdf.page_texts() {
            Ok(pages) => pages.join("\n"),
            Err(e) => {
                warn!("Treating PDF text layer as empty: {}", e);
                String::new()
            }
        };

        if !text.trim().is_empty() || !self.config.ocr_fallback {
            return Ok(RawText {
                text,
                source: TextSource::PdfTextLayer,
            });
        }

        let ocr = self.ocr.as_ref().ok_or(AcquisitionError::OcrUnavailable)?;

        let page_count = pdf.page_count();
        let pages = match self.config.ocr_max_pages {
            0 => page_count,
            max => page_count.min(max as u32),
        };
        info!("No text layer found; running OCR on {} of {} pages", pages, page_count);

        let mut texts = Vec::with_capacity(pages as usize);
        let mut imaged = 0;
        for page in 1..=pages {
            match ocr_page(&pdf, ocr.as_ref(), page)? {
                Some(text) => {
                    imaged += 1;
                    texts.push(text);
                }
                None => texts.push(String::new()),
            }
        }

        if imaged == 0 {
            return Err(PdfError::ImageExtraction(format!(
                "none of {} pages has a decodable image",
                pages
            ))
            .into());
        }

        Ok(RawText {
            text: texts.join("\n"),
            source: TextSource::PdfOcr,
        })
    }
}

/// OCR text of one page, or `None` when the page has no decodable image.
fn ocr_page(
    pdf: &PdfExtractor,
    ocr: &dyn PageOcr,
    page: u32,
) -> std::result::Result<Option<String>, AcquisitionError> {
    let Some(image) = pdf.page_image(page)? else {
        warn!("Page {}: no decodable image to OCR", page);
        return Ok(None);
    };

    let result = ocr.recognize_page(&image)?;
    debug!("Page {}: recognized {} text boxes", page, result.boxes.len());
    Ok(Some(result.text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_document_type_from_path() {
        assert_eq!(
            Document::from_path("loan.PDF").unwrap().doc_type,
            DocumentType::Pdf
        );
        assert_eq!(
            Document::from_path("dir/agreement.docx").unwrap().doc_type,
            DocumentType::Docx
        );
    }

    #[test]
    fn test_unsupported_extensions() {
        for path in ["notes.txt", "legacy.doc", "README"] {
            let err = Document::from_path(path).unwrap_err();
            assert!(matches!(err, LoanLensError::UnsupportedFormat(_)), "{path}");
        }
    }

    #[test]
    fn test_unsupported_format_before_io() {
        let acquirer = TextAcquirer::new(PdfConfig::default());
        let err = acquirer.acquire("/does/not/exist.xlsx").unwrap_err();
        assert!(matches!(err, LoanLensError::UnsupportedFormat(ext) if ext == ".xlsx"));
    }

    #[test]
    fn test_missing_file_is_acquisition_failure() {
        let acquirer = TextAcquirer::new(PdfConfig::default());
        let err = acquirer.acquire("/does/not/exist.docx").unwrap_err();
        assert!(err.is_acquisition_failure());
    }
}
