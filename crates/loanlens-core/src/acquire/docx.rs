//! DOCX text extraction from the main document part.

use std::io::{Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, trace};

use crate::error::DocxError;

/// Path of the main document part inside the container.
pub const DOCUMENT_PART: &str = "word/document.xml";

/// Read the body text of a DOCX container.
pub fn extract_text<R: Read + Seek>(reader: R) -> Result<String, DocxError> {
    let mut archive =
        zip::ZipArchive::new(reader).map_err(|e| DocxError::Archive(e.to_string()))?;

    let mut xml = String::new();
    {
        let mut part = archive.by_name(DOCUMENT_PART).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => DocxError::MissingPart(DOCUMENT_PART),
            other => DocxError::Archive(other.to_string()),
        })?;
        part.read_to_string(&mut xml)
            .map_err(|e| DocxError::Archive(format!("failed to read {}: {}", DOCUMENT_PART, e)))?;
    }

    let paragraphs = body_paragraphs(&xml)?;
    debug!("DOCX body has {} paragraphs", paragraphs.len());

    Ok(paragraphs
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Text of every top-level body paragraph of `word/document.xml`, in order.
///
/// Paragraphs inside tables and text boxes are not body paragraphs. Run text
/// comes from `w:t`; `w:tab` becomes a tab and `w:br`/`w:cr` a newline.
pub fn body_paragraphs(xml: &str) -> Result<Vec<String>, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut paragraphs = Vec::new();
    // Depth of the open body paragraph, and its text so far
    let mut current: Option<(usize, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"p" && current.is_none() && parent_is(&stack, b"body") {
                    current = Some((stack.len() + 1, String::new()));
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = e.local_name();
                if let Some((_, text)) = current.as_mut() {
                    if parent_is(&stack, b"r") && !in_text_box(&stack) {
                        match name.as_ref() {
                            b"tab" => text.push('\t'),
                            b"br" | b"cr" => text.push('\n'),
                            _ => {}
                        }
                    }
                } else if name.as_ref() == b"p" && parent_is(&stack, b"body") {
                    paragraphs.push(String::new());
                }
            }
            Ok(Event::Text(e)) => {
                if let Some((_, text)) = current.as_mut() {
                    if parent_is(&stack, b"t") && !in_text_box(&stack) {
                        let unescaped = e.unescape().map_err(|e| DocxError::Xml(e.to_string()))?;
                        text.push_str(&unescaped);
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((_, text)) = current.as_mut() {
                    if parent_is(&stack, b"t") && !in_text_box(&stack) {
                        text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
                if current.as_ref().is_some_and(|(depth, _)| stack.len() < *depth) {
                    if let Some((_, text)) = current.take() {
                        trace!("Paragraph: {:?}", text);
                        paragraphs.push(text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(DocxError::Xml(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    Ok(paragraphs)
}

fn parent_is(stack: &[Vec<u8>], name: &[u8]) -> bool {
    stack.last().is_some_and(|top| top.as_slice() == name)
}

fn in_text_box(stack: &[Vec<u8>]) -> bool {
    stack.iter().any(|name| name.as_slice() == b"txbxContent")
}
