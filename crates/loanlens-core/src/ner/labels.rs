//! Model label map: `id2label` entries parsed into typed tags.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::NerError;
use crate::models::{FieldKind, UnknownLabelPolicy};

/// A token label, resolved against the known field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// Not part of an entity (`O`, or a label that was ignored).
    Outside,
    /// First token of an entity (`B-`).
    Begin(FieldKind),
    /// Continuation of an entity (`I-`, or a bare label).
    Inside(FieldKind),
    /// Last token of an entity (`E-`, `L-`).
    Last(FieldKind),
    /// Single-token entity (`S-`, `U-`).
    Single(FieldKind),
}

/// Split a label into its scheme prefix and entity type.
fn split_label(label: &str) -> (Option<char>, &str) {
    let mut chars = label.chars();
    if let (Some(prefix), Some(sep)) = (chars.next(), chars.next()) {
        if matches!(sep, '-' | '_') && "BIELSU".contains(prefix.to_ascii_uppercase()) {
            return (Some(prefix.to_ascii_uppercase()), &label[2..]);
        }
    }
    (None, label)
}

/// Resolve a single label. `None` means the entity type is unknown.
fn parse_tag(label: &str) -> Option<Tag> {
    let label = label.trim();
    if label.eq_ignore_ascii_case("O") {
        return Some(Tag::Outside);
    }

    let (prefix, entity) = split_label(label);
    let kind = FieldKind::parse(entity)?;

    Some(match prefix {
        Some('B') => Tag::Begin(kind),
        Some('E') | Some('L') => Tag::Last(kind),
        Some('S') | Some('U') => Tag::Single(kind),
        _ => Tag::Inside(kind),
    })
}

#[derive(Debug, Deserialize)]
struct LabelConfig {
    id2label: HashMap<String, String>,
}

/// Label id to tag lookup for a token classification model.
#[derive(Debug, Clone)]
pub struct LabelMap {
    tags: Vec<Tag>,
}

impl LabelMap {
    /// Build from `(id, label)` pairs. Ids missing from the pairs map to
    /// [`Tag::Outside`].
    pub fn from_pairs<I, S>(pairs: I, policy: UnknownLabelPolicy) -> Result<Self, NerError>
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<String>,
    {
        let pairs: Vec<(usize, String)> = pairs.into_iter().map(|(id, l)| (id, l.into())).collect();
        let len = pairs.iter().map(|(id, _)| id + 1).max().unwrap_or(0);

        let mut tags = vec![Tag::Outside; len];

        for (id, label) in pairs {
            match parse_tag(&label) {
                Some(tag) => tags[id] = tag,
                None => match policy {
                    UnknownLabelPolicy::Reject => return Err(NerError::UnknownLabel(label)),
                    UnknownLabelPolicy::Ignore => {
                        warn!("Ignoring model label '{}': not a known field kind", label)
                    }
                },
            }
        }

        Ok(Self { tags })
    }

    /// Parse the `id2label` table of a Hugging Face style `config.json`.
    pub fn from_config_json(json: &str, policy: UnknownLabelPolicy) -> Result<Self, NerError> {
        let config: LabelConfig = serde_json::from_str(json)
            .map_err(|e| NerError::ModelLoad(format!("invalid label config: {}", e)))?;

        let pairs = config
            .id2label
            .into_iter()
            .map(|(id, label)| {
                id.parse::<usize>()
                    .map(|id| (id, label))
                    .map_err(|_| NerError::ModelLoad(format!("invalid label id '{}'", id)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_pairs(pairs, policy)
    }

    /// Load `config.json` from disk.
    pub fn from_file(path: &Path, policy: UnknownLabelPolicy) -> Result<Self, NerError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            NerError::ModelLoad(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_config_json(&json, policy)
    }

    /// Tag for a label id; out-of-range ids are outside.
    pub fn tag(&self, id: usize) -> Tag {
        self.tags.get(id).copied().unwrap_or(Tag::Outside)
    }

    /// Number of labels the model emits.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
