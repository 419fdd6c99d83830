//! Doccano annotation loading and recognizer evaluation.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{LoanLensError, NerError, Result};
use crate::models::{EntitySpan, FieldKind};
use crate::ner::EntityRecognizer;

/// Keys under which Doccano exports store spans.
const SPAN_KEYS: [&str; 4] = ["spans", "labels", "label", "entities"];

/// A gold span with byte offsets into the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GoldSpan {
    pub kind: FieldKind,
    pub start: usize,
    pub end: usize,
}

/// One annotated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedDocument {
    pub text: String,
    pub spans: Vec<GoldSpan>,
    /// Spans whose label is not a known field kind.
    pub unknown_labels: usize,
}

/// Load a Doccano JSONL export.
pub fn load_doccano(path: &Path) -> Result<Vec<AnnotatedDocument>> {
    let content = std::fs::read_to_string(path)?;
    let docs = parse_doccano(&content)?;
    debug!("Loaded {} annotated documents from {}", docs.len(), path.display());
    Ok(docs)
}

/// Parse Doccano JSONL content. Blank lines are skipped.
pub fn parse_doccano(content: &str) -> Result<Vec<AnnotatedDocument>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let value: Value = serde_json::from_str(line).map_err(|e| {
                LoanLensError::Annotations(format!("line {}: {}", idx + 1, e))
            })?;
            Ok(parse_record(&value))
        })
        .collect()
}

fn parse_record(record: &Value) -> AnnotatedDocument {
    let text = record
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let boundaries = char_boundaries(&text);

    let mut spans = Vec::new();
    let mut unknown_labels = 0;

    let raw_spans = SPAN_KEYS
        .iter()
        .filter_map(|key| record.get(*key).and_then(Value::as_array))
        .flatten();

    for raw in raw_spans {
        let Some((start, end, label)) = span_parts(raw) else {
            continue;
        };
        let Some(kind) = FieldKind::parse(label) else {
            unknown_labels += 1;
            continue;
        };
        // Character offsets to byte offsets
        match (boundaries.get(start), boundaries.get(end)) {
            (Some(&start), Some(&end)) if start < end => spans.push(GoldSpan { kind, start, end }),
            _ => warn!("Skipping span {}..{} outside the text", start, end),
        }
    }

    AnnotatedDocument {
        text,
        spans,
        unknown_labels,
    }
}

/// `(start, end, label)` of an object span or a `[start, end, label]` array.
fn span_parts(raw: &Value) -> Option<(usize, usize, &str)> {
    match raw {
        Value::Object(obj) => {
            let offset = |keys: [&str; 2]| {
                keys.iter()
                    .find_map(|k| obj.get(*k).and_then(Value::as_u64))
                    .map(|v| v as usize)
            };
            let start = offset(["start_offset", "start"])?;
            let end = offset(["end_offset", "end"])?;
            let label = obj.get("label")?.as_str()?;
            Some((start, end, label))
        }
        Value::Array(items) if items.len() >= 3 => Some((
            items[0].as_u64()? as usize,
            items[1].as_u64()? as usize,
            items[2].as_str()?,
        )),
        _ => None,
    }
}

/// Byte offset of every character boundary, including the end of the text.
fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .collect()
}

/// Span counts for one field kind (or all kinds together).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpanCounts {
    pub true_positives: usize,
    pub predicted: usize,
    pub gold: usize,
}

impl SpanCounts {
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.predicted)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.gold)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
    }

    fn add(&mut self, other: &SpanCounts) {
        self.true_positives += other.true_positives;
        self.predicted += other.predicted;
        self.gold += other.gold;
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Exact-match span scores over a set of documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    pub documents: usize,
    pub per_kind: BTreeMap<FieldKind, SpanCounts>,
    /// Gold spans skipped because their label is not a field kind.
    pub unknown_labels: usize,
}

impl Evaluation {
    /// Score one document's predictions against its gold spans.
    ///
    /// A prediction is correct when kind, start and end all match.
    pub fn add_document(&mut self, predicted: &[EntitySpan], doc: &AnnotatedDocument) {
        let predicted: HashSet<GoldSpan> = predicted
            .iter()
            .map(|s| GoldSpan {
                kind: s.kind,
                start: s.start,
                end: s.end,
            })
            .collect();
        let gold: HashSet<GoldSpan> = doc.spans.iter().copied().collect();

        for span in &predicted {
            let counts = self.per_kind.entry(span.kind).or_default();
            counts.predicted += 1;
            if gold.contains(span) {
                counts.true_positives += 1;
            }
        }
        for span in &gold {
            self.per_kind.entry(span.kind).or_default().gold += 1;
        }

        self.documents += 1;
        self.unknown_labels += doc.unknown_labels;
    }

    /// Counts summed over all kinds.
    pub fn micro(&self) -> SpanCounts {
        let mut total = SpanCounts::default();
        for counts in self.per_kind.values() {
            total.add(counts);
        }
        total
    }
}

/// Run the recognizer over every document and score all emitted spans.
pub fn evaluate(
    recognizer: &dyn EntityRecognizer,
    docs: &[AnnotatedDocument],
) -> std::result::Result<Evaluation, NerError> {
    let mut evaluation = Evaluation::default();
    for doc in docs {
        let predicted = recognizer.recognize(&doc.text)?;
        evaluation.add_document(&predicted, doc);
    }
    Ok(evaluation)
}
