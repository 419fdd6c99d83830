//! Named entity recognition over acquired agreement text.

pub mod decode;
pub mod labels;
#[cfg(feature = "native")]
mod onnx;

pub use decode::{decode_spans, TokenTag};
pub use labels::{LabelMap, Tag};
#[cfg(feature = "native")]
pub use onnx::OnnxEntityRecognizer;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::NerError;
use crate::models::{EntitySpan, FieldKind};

/// A loaded entity recognizer.
///
/// Implementations are loaded once and shared between extraction calls.
pub trait EntityRecognizer: Send + Sync {
    /// Labeled spans of `text`, in left-to-right order. An empty vector means
    /// nothing was found; `Err` is reserved for inference failures.
    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, NerError>;
}

/// Which span is kept when a field kind is recognized more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanSelection {
    /// The first span in emission order.
    #[default]
    FirstMatch,
    /// The span with the highest score; ties and unscored spans fall back to
    /// emission order.
    HighestConfidence,
}

impl SpanSelection {
    /// One span per kind, in emission order of the kept spans.
    pub fn select<'a>(&self, spans: &'a [EntitySpan]) -> Vec<&'a EntitySpan> {
        let mut best: BTreeMap<FieldKind, usize> = BTreeMap::new();

        for (idx, span) in spans.iter().enumerate() {
            match best.get(&span.kind) {
                None => {
                    best.insert(span.kind, idx);
                }
                Some(&current) => {
                    if *self == SpanSelection::HighestConfidence
                        && span.score > spans[current].score
                    {
                        best.insert(span.kind, idx);
                    }
                }
            }
        }

        let mut kept: Vec<usize> = best.into_values().collect();
        kept.sort_unstable();
        kept.into_iter().map(|idx| &spans[idx]).collect()
    }
}
