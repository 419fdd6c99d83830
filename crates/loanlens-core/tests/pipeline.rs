//! End-to-end extraction over generated DOCX and PDF files.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use pretty_assertions::assert_eq;

use loanlens_core::error::{AcquisitionError, NerError, OcrError, PdfError};
use loanlens_core::models::PdfConfig;
use loanlens_core::{
    EntityRecognizer, EntitySpan, FieldKind, FieldOrigin, LoanLensError, LoanRecord, OcrResult,
    PageOcr, Pipeline, SpanSelection, TextBox, TextSource,
};

/// Recognizes fixed phrases wherever they occur, in text order.
struct PhraseRecognizer(Vec<(FieldKind, &'static str)>);

impl EntityRecognizer for PhraseRecognizer {
    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, NerError> {
        let mut spans: Vec<EntitySpan> = self
            .0
            .iter()
            .flat_map(|(kind, phrase)| {
                text.match_indices(phrase)
                    .map(move |(start, m)| EntitySpan::new(*kind, m, start, start + m.len()).with_score(0.9))
            })
            .collect();
        spans.sort_by_key(|s| s.start);
        Ok(spans)
    }
}

/// Returns the same text for every page.
struct FixedOcr(&'static str);

impl PageOcr for FixedOcr {
    fn recognize_page(&self, image: &DynamicImage) -> Result<OcrResult, OcrError> {
        let text_box = TextBox {
            bbox: [0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0],
            text: self.0.to_string(),
            score: 0.8,
        };
        Ok(OcrResult::from_boxes(vec![text_box], (image.width(), image.height()), 1))
    }
}

/// Fails on every page.
struct FailingOcr;

impl PageOcr for FailingOcr {
    fn recognize_page(&self, _image: &DynamicImage) -> Result<OcrResult, OcrError> {
        Err(OcrError::Recognition("detector session crashed".to_string()))
    }
}

fn loan_recognizer() -> Arc<dyn EntityRecognizer> {
    Arc::new(PhraseRecognizer(vec![
        (FieldKind::OriginalDate, "04 November 2009"),
        (FieldKind::Lender, "Acme Corp, a Delaware corporation"),
        (FieldKind::Principal, "$1,250,000.00"),
        (FieldKind::Currency, "USD"),
        (FieldKind::InterestRate, "12.5% per annum"),
        (FieldKind::MaturityDate, "31/12/20"),
    ]))
}

fn write_docx(dir: &Path, name: &str, paragraphs: &[&str]) -> PathBuf {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap();
    path
}

/// What the single page of a generated PDF shows.
enum PdfPage<'a> {
    /// A Helvetica text layer.
    Text(&'a str),
    /// An 8-bit grayscale scan.
    Scan,
    /// A 1-bit scan with rows packed into bytes.
    BilevelScan,
    /// A fax-encoded scan that cannot be decoded.
    FaxScan,
}

/// Resources and content stream drawing one 8x8 grayscale image.
fn scan_resources(doc: &mut Document, bits: i64, filter: Option<&str>, data: Vec<u8>) -> (Dictionary, Vec<u8>) {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => 8,
        "Height" => 8,
        "ColorSpace" => "DeviceGray",
        "BitsPerComponent" => bits,
    };
    if let Some(filter) = filter {
        dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    }
    let image_id = doc.add_object(Stream::new(dict, data));
    (
        dictionary! { "XObject" => dictionary! { "Im0" => image_id } },
        b"q 612 0 0 792 0 0 cm /Im0 Do Q".to_vec(),
    )
}

fn write_pdf(dir: &Path, name: &str, page: PdfPage<'_>) -> PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let (resources, content) = match page {
        PdfPage::Scan => scan_resources(&mut doc, 8, None, vec![200u8; 64]),
        PdfPage::BilevelScan => scan_resources(&mut doc, 1, None, vec![0b1010_1010; 8]),
        PdfPage::FaxScan => scan_resources(&mut doc, 1, Some("CCITTFaxDecode"), vec![0u8; 8]),
        PdfPage::Text(text) => {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
            });
            let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
            (
                dictionary! { "Font" => dictionary! { "F1" => font_id } },
                content.into_bytes(),
            )
        }
    };

    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.join(name);
    doc.save(&path).unwrap();
    path
}

#[test]
fn extracts_record_from_docx() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_docx(
        dir.path(),
        "agreement.docx",
        &[
            "LOAN AGREEMENT dated 04 November 2009",
            "",
            "between Acme Corp, a Delaware corporation (the \"Lender\") and ABC Holdings LLC (the \"Borrower\").",
            "Principal amount: $1,250,000.00 USD, bearing interest at 12.5% per annum.",
            "Maturity: 31/12/20",
        ],
    );

    let pipeline = Pipeline::builder(loan_recognizer()).build();
    let result = pipeline.extract(&path).unwrap();

    assert_eq!(
        result.to_record(),
        LoanRecord {
            original_date: "2009/11/04".to_string(),
            lender: "Acme Corp".to_string(),
            borrower: "ABC Holdings LLC".to_string(),
            principal: "125000000".to_string(),
            currency: "USD".to_string(),
            interest_rate: "12.5%".to_string(),
            maturity_date: "31/12/2020".to_string(),
        }
    );
    assert_eq!(
        result.get(FieldKind::Borrower).unwrap().origin,
        FieldOrigin::Recovered
    );
    assert!(result.validate().is_empty());
}

#[test]
fn docx_without_paragraphs_gives_empty_result() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_docx(dir.path(), "empty.docx", &[]);

    let pipeline = Pipeline::builder(loan_recognizer()).build();
    let raw = pipeline.acquire(&path).unwrap();
    assert_eq!(raw.text, "");
    assert_eq!(raw.source, TextSource::Docx);

    let result = pipeline.extract(&path).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.to_record(), LoanRecord::default());
}

#[test]
fn duplicate_kinds_keep_first_occurrence() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_docx(
        dir.path(),
        "rates.docx",
        &["Interest at 5% per annum, default interest at 9% per annum."],
    );
    let recognizer: Arc<dyn EntityRecognizer> = Arc::new(PhraseRecognizer(vec![
        (FieldKind::InterestRate, "9% per annum"),
        (FieldKind::InterestRate, "5% per annum"),
    ]));

    let pipeline = Pipeline::builder(recognizer.clone()).build();
    let result = pipeline.extract(&path).unwrap();
    assert_eq!(result.value(FieldKind::InterestRate), Some("5%"));

    let pipeline = Pipeline::builder(recognizer)
        .selection(SpanSelection::HighestConfidence)
        .build();
    let result = pipeline.extract(&path).unwrap();
    // Equal scores fall back to emission order
    assert_eq!(result.value(FieldKind::InterestRate), Some("5%"));
}

#[test]
fn unsupported_format_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agreement.txt");
    std::fs::write(&path, "Acme Corp, a Delaware corporation").unwrap();

    let pipeline = Pipeline::builder(loan_recognizer()).build();
    let err = pipeline.extract(&path).unwrap_err();
    assert!(matches!(err, LoanLensError::UnsupportedFormat(_)));
    assert!(!err.is_acquisition_failure());
}

#[test]
fn corrupt_files_are_acquisition_failures() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("broken.pdf");
    let docx = dir.path().join("broken.docx");
    std::fs::write(&pdf, b"%PDF-1.4 truncated").unwrap();
    std::fs::write(&docx, b"not a zip").unwrap();

    let pipeline = Pipeline::builder(loan_recognizer()).build();
    for path in [pdf, docx] {
        let err = pipeline.extract(&path).unwrap_err();
        assert!(err.is_acquisition_failure(), "{}: {}", path.display(), err);
    }
}

#[test]
fn pdf_text_layer_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "native.pdf", PdfPage::Text("Principal $1,250,000.00 USD"));

    let pipeline = Pipeline::builder(loan_recognizer())
        .ocr(Arc::new(FixedOcr("should not be used")))
        .build();
    let raw = pipeline.acquire(&path).unwrap();
    assert_eq!(raw.source, TextSource::PdfTextLayer);
    assert!(raw.text.contains("Principal"), "{:?}", raw.text);
}

#[test]
fn scanned_pdf_falls_back_to_ocr() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "scan.pdf", PdfPage::Scan);

    let pipeline = Pipeline::builder(loan_recognizer())
        .ocr(Arc::new(FixedOcr("Loan of $1,250,000.00 USD")))
        .build();

    let raw = pipeline.acquire(&path).unwrap();
    assert_eq!(raw.source, TextSource::PdfOcr);
    assert_eq!(raw.text, "Loan of $1,250,000.00 USD");

    let result = pipeline.extract(&path).unwrap();
    assert_eq!(result.value(FieldKind::Principal), Some("125000000"));
    assert_eq!(result.value(FieldKind::Currency), Some("USD"));
}

#[test]
fn scanned_pdf_without_ocr_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "scan.pdf", PdfPage::Scan);

    let pipeline = Pipeline::builder(loan_recognizer()).build();
    let err = pipeline.extract(&path).unwrap_err();
    assert!(matches!(
        err,
        LoanLensError::Acquisition(AcquisitionError::OcrUnavailable)
    ));

    let pipeline = Pipeline::builder(loan_recognizer())
        .pdf_config(PdfConfig {
            ocr_fallback: false,
            ..Default::default()
        })
        .build();
    assert!(pipeline.extract(&path).unwrap().is_empty());
}

#[test]
fn ocr_engine_failure_is_acquisition_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "scan.pdf", PdfPage::Scan);

    let pipeline = Pipeline::builder(loan_recognizer())
        .ocr(Arc::new(FailingOcr))
        .build();
    let err = pipeline.extract(&path).unwrap_err();
    assert!(err.is_acquisition_failure());
    assert!(
        matches!(
            err,
            LoanLensError::Acquisition(AcquisitionError::Ocr(OcrError::Recognition(_)))
        ),
        "{}",
        err
    );
}

#[test]
fn bilevel_scan_is_sent_to_ocr() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "bilevel.pdf", PdfPage::BilevelScan);

    let pipeline = Pipeline::builder(loan_recognizer())
        .ocr(Arc::new(FixedOcr("Loan of $1,250,000.00 USD")))
        .build();
    let raw = pipeline.acquire(&path).unwrap();
    assert_eq!(raw.source, TextSource::PdfOcr);
    assert_eq!(raw.text, "Loan of $1,250,000.00 USD");
}

#[test]
fn undecodable_scan_is_acquisition_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(dir.path(), "fax.pdf", PdfPage::FaxScan);

    let pipeline = Pipeline::builder(loan_recognizer())
        .ocr(Arc::new(FixedOcr("never reached")))
        .build();
    let err = pipeline.extract(&path).unwrap_err();
    assert!(
        matches!(
            err,
            LoanLensError::Acquisition(AcquisitionError::Pdf(PdfError::ImageExtraction(_)))
        ),
        "{}",
        err
    );
}
