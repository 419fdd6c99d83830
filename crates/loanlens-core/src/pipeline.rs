//! Extraction pipeline: acquire, recognize, select, trim, normalize, recover.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::acquire::{RawText, TextAcquirer};
use crate::error::Result;
use crate::fields::{normalize, recover_borrower, trim_span};
use crate::models::{EntitySpan, ExtractionResult, FieldKind, NormalizedField, PdfConfig};
use crate::ner::{EntityRecognizer, SpanSelection};
use crate::ocr::PageOcr;

#[cfg(feature = "native")]
use crate::models::LoanLensConfig;

/// Build the result for one document from its text and recognized spans.
///
/// One span is kept per kind according to `selection`; its text is trimmed
/// and normalized. A borrower the spans missed is then recovered from the
/// text following the lender.
pub fn assemble(text: &str, spans: &[EntitySpan], selection: SpanSelection) -> ExtractionResult {
    let mut result = ExtractionResult::new();

    for span in selection.select(spans) {
        let raw = span.text.trim();
        let value = normalize(span.kind, &trim_span(span.kind, raw));
        result.insert_if_absent(span.kind, NormalizedField::new(raw, value));
    }

    if let Some(borrower) = recover_borrower(text, &result) {
        result.insert_if_absent(FieldKind::Borrower, borrower);
    }

    if result.parties_coincide() {
        warn!("Lender and borrower resolve to the same party");
    }

    result
}

/// Loan agreement extraction pipeline.
///
/// Holds the loaded recognizer and OCR engine; every call is independent.
#[derive(Clone)]
pub struct Pipeline {
    acquirer: TextAcquirer,
    recognizer: Arc<dyn EntityRecognizer>,
    selection: SpanSelection,
}

impl Pipeline {
    /// Start building a pipeline around a loaded recognizer.
    pub fn builder(recognizer: Arc<dyn EntityRecognizer>) -> PipelineBuilder {
        PipelineBuilder::new(recognizer)
    }

    /// Load the ONNX recognizer and, when its model files are present, the
    /// OCR engine.
    #[cfg(feature = "native")]
    pub fn from_config(config: &LoanLensConfig) -> Result<Self> {
        use crate::ner::OnnxEntityRecognizer;
        use crate::ocr::PureOcrEngine;

        let recognizer = OnnxEntityRecognizer::from_config(&config.models, &config.ner)?;

        let mut builder = PipelineBuilder::new(Arc::new(recognizer))
            .pdf_config(config.pdf.clone())
            .selection(config.ner.selection);

        if config.pdf.ocr_fallback {
            match PureOcrEngine::from_config(&config.models, config.ocr.clone()) {
                Ok(engine) => builder = builder.ocr(Arc::new(engine)),
                Err(e) => warn!("OCR disabled: {}", e),
            }
        }

        Ok(builder.build())
    }

    /// Extract loan fields from the document at `path`.
    pub fn extract(&self, path: impl AsRef<Path>) -> Result<ExtractionResult> {
        let path = path.as_ref();
        let start = Instant::now();

        let raw = self.acquire(path)?;
        debug!("Acquired {} bytes of text ({:?})", raw.text.len(), raw.source);

        let result = self.extract_text(&raw.text)?;

        info!(
            "Extracted {} fields from {} in {}ms",
            result.len(),
            path.display(),
            start.elapsed().as_millis()
        );
        Ok(result)
    }

    /// Extract loan fields from already acquired text.
    pub fn extract_text(&self, text: &str) -> Result<ExtractionResult> {
        if text.trim().is_empty() {
            debug!("Blank text, nothing to recognize");
            return Ok(ExtractionResult::new());
        }

        let spans = self.recognizer.recognize(text)?;
        debug!("Recognizer returned {} spans", spans.len());

        Ok(assemble(text, &spans, self.selection))
    }

    /// Acquire the text of a document without running the recognizer.
    pub fn acquire(&self, path: impl AsRef<Path>) -> Result<RawText> {
        self.acquirer.acquire(path)
    }

    pub fn recognizer(&self) -> &dyn EntityRecognizer {
        self.recognizer.as_ref()
    }

    pub fn selection(&self) -> SpanSelection {
        self.selection
    }

    pub fn has_ocr(&self) -> bool {
        self.acquirer.has_ocr()
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    recognizer: Arc<dyn EntityRecognizer>,
    pdf: PdfConfig,
    ocr: Option<Arc<dyn PageOcr>>,
    selection: SpanSelection,
}

impl PipelineBuilder {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>) -> Self {
        Self {
            recognizer,
            pdf: PdfConfig::default(),
            ocr: None,
            selection: SpanSelection::default(),
        }
    }

    /// Set the PDF processing configuration.
    pub fn pdf_config(mut self, config: PdfConfig) -> Self {
        self.pdf = config;
        self
    }

    /// Set the OCR engine used for PDFs without a text layer.
    pub fn ocr(mut self, engine: Arc<dyn PageOcr>) -> Self {
        self.ocr = Some(engine);
        self
    }

    /// Set how duplicate spans of one kind are resolved.
    pub fn selection(mut self, selection: SpanSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn build(self) -> Pipeline {
        let mut acquirer = TextAcquirer::new(self.pdf);
        if let Some(ocr) = self.ocr {
            acquirer = acquirer.with_ocr(ocr);
        }

        Pipeline {
            acquirer,
            recognizer: self.recognizer,
            selection: self.selection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LoanLensError, NerError};
    use crate::models::FieldOrigin;
    use pretty_assertions::assert_eq;

    fn span(text: &str, kind: FieldKind, word: &str) -> EntitySpan {
        let start = text.find(word).unwrap();
        EntitySpan::new(kind, word, start, start + word.len())
    }

    const AGREEMENT: &str = "LOAN AGREEMENT dated 04 November 2009 between \
        Acme Corp, a Delaware corporation (the \"Lender\") and ABC Holdings LLC \
        (the \"Borrower\"). Principal: $1,250,000.00 USD at 12.5% per annum, \
        repayable on 31/12/20.";

    #[test]
    fn test_assemble_normalizes_each_kind() {
        let spans = vec![
            span(AGREEMENT, FieldKind::OriginalDate, "04 November 2009"),
            span(AGREEMENT, FieldKind::Lender, "Acme Corp, a Delaware corporation"),
            span(AGREEMENT, FieldKind::Principal, "$1,250,000.00"),
            span(AGREEMENT, FieldKind::Currency, "USD"),
            span(AGREEMENT, FieldKind::InterestRate, "12.5% per annum"),
            span(AGREEMENT, FieldKind::MaturityDate, "31/12/20"),
        ];

        let result = assemble(AGREEMENT, &spans, SpanSelection::FirstMatch);
        let record = result.to_record();

        assert_eq!(record.original_date, "2009/11/04");
        assert_eq!(record.lender, "Acme Corp");
        assert_eq!(record.principal, "125000000");
        assert_eq!(record.currency, "USD");
        assert_eq!(record.interest_rate, "12.5%");
        assert_eq!(record.maturity_date, "31/12/2020");

        let lender = result.get(FieldKind::Lender).unwrap();
        assert_eq!(lender.raw, "Acme Corp, a Delaware corporation");

        // Borrower was not recognized and is recovered from the text
        let borrower = result.get(FieldKind::Borrower).unwrap();
        assert_eq!(borrower.value, "ABC Holdings LLC");
        assert_eq!(borrower.origin, FieldOrigin::Recovered);
    }

    #[test]
    fn test_assemble_first_match_wins() {
        let text = "Rates: 5% or 7%";
        let spans = vec![
            span(text, FieldKind::InterestRate, "5%").with_score(0.4),
            span(text, FieldKind::InterestRate, "7%").with_score(0.9),
        ];

        let first = assemble(text, &spans, SpanSelection::FirstMatch);
        assert_eq!(first.value(FieldKind::InterestRate), Some("5%"));

        let best = assemble(text, &spans, SpanSelection::HighestConfidence);
        assert_eq!(best.value(FieldKind::InterestRate), Some("7%"));
    }

    #[test]
    fn test_recognized_borrower_is_not_replaced() {
        let spans = vec![
            span(AGREEMENT, FieldKind::Lender, "Acme Corp"),
            span(AGREEMENT, FieldKind::Borrower, "ABC Holdings"),
        ];
        let result = assemble(AGREEMENT, &spans, SpanSelection::FirstMatch);
        let borrower = result.get(FieldKind::Borrower).unwrap();
        assert_eq!(borrower.value, "ABC Holdings");
        assert_eq!(borrower.origin, FieldOrigin::Recognized);
    }

    struct Failing;

    impl EntityRecognizer for Failing {
        fn recognize(&self, _text: &str) -> std::result::Result<Vec<EntitySpan>, NerError> {
            Err(NerError::Output("boom".to_string()))
        }
    }

    #[test]
    fn test_blank_text_skips_recognizer() {
        let pipeline = Pipeline::builder(Arc::new(Failing)).build();
        assert!(pipeline.extract_text(" \n\t").unwrap().is_empty());

        let err = pipeline.extract_text("Loan").unwrap_err();
        assert!(matches!(err, LoanLensError::Ner(_)));
    }
}
