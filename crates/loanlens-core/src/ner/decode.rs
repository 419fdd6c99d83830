//! Token-level predictions to entity spans.

use crate::models::{EntitySpan, FieldKind};

use super::labels::Tag;

/// Prediction for one token of the acquired text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenTag {
    pub tag: Tag,
    /// Probability of the predicted label.
    pub score: f32,
    /// Byte offset of the token start in the text.
    pub start: usize,
    /// Byte offset one past the token end.
    pub end: usize,
    /// The token is a sub-word piece of the same word as the previous token.
    pub continues_word: bool,
}

/// Index and softmax probability of the highest logit.
pub fn argmax_softmax(logits: &[f32]) -> Option<(usize, f32)> {
    let (best, max) = logits
        .iter()
        .copied()
        .enumerate()
        .fold(None, |acc: Option<(usize, f32)>, (i, v)| match acc {
            Some((_, m)) if m >= v => acc,
            _ => Some((i, v)),
        })?;

    let sum: f32 = logits.iter().map(|v| (v - max).exp()).sum();
    Some((best, 1.0 / sum))
}

struct OpenSpan {
    kind: FieldKind,
    start: usize,
    end: usize,
    scores: Vec<f32>,
}

impl OpenSpan {
    fn new(kind: FieldKind, token: &TokenTag) -> Self {
        Self {
            kind,
            start: token.start,
            end: token.end,
            scores: vec![token.score],
        }
    }

    fn extend(&mut self, token: &TokenTag) {
        self.end = self.end.max(token.end);
        self.scores.push(token.score);
    }

    fn finish(self, text: &str) -> Option<EntitySpan> {
        let slice = text.get(self.start..self.end)?;
        if slice.trim().is_empty() {
            return None;
        }
        let score = self.scores.iter().sum::<f32>() / self.scores.len() as f32;
        Some(EntitySpan::new(self.kind, slice, self.start, self.end).with_score(score))
    }
}

/// Group tagged tokens into entity spans, in left-to-right order.
///
/// `B` opens a span; `I` extends an open span of the same kind or opens one;
/// `L`/`E` extend then close; `S`/`U` emit a single-token span; `O` closes.
/// A sub-word piece continuing a word extends the open span whatever its own
/// tag, and is dropped when no span is open.
pub fn decode_spans(text: &str, tokens: &[TokenTag]) -> Vec<EntitySpan> {
    let mut spans = Vec::new();
    let mut open: Option<OpenSpan> = None;

    for token in tokens {
        if token.continues_word {
            if let Some(span) = open.as_mut() {
                span.extend(token);
            }
            continue;
        }

        match token.tag {
            Tag::Outside => close(text, &mut open, &mut spans),
            Tag::Begin(kind) => {
                close(text, &mut open, &mut spans);
                open = Some(OpenSpan::new(kind, token));
            }
            Tag::Inside(kind) | Tag::Last(kind) => {
                match open.as_mut().filter(|span| span.kind == kind) {
                    Some(span) => span.extend(token),
                    None => {
                        close(text, &mut open, &mut spans);
                        open = Some(OpenSpan::new(kind, token));
                    }
                }
                if matches!(token.tag, Tag::Last(_)) {
                    close(text, &mut open, &mut spans);
                }
            }
            Tag::Single(kind) => {
                close(text, &mut open, &mut spans);
                open = Some(OpenSpan::new(kind, token));
                close(text, &mut open, &mut spans);
            }
        }
    }
    close(text, &mut open, &mut spans);

    spans
}

fn close(text: &str, open: &mut Option<OpenSpan>, spans: &mut Vec<EntitySpan>) {
    if let Some(span) = open.take().and_then(|s| s.finish(text)) {
        spans.push(span);
    }
}
