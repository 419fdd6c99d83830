//! Loan agreement data models: field kinds, entity spans and extraction results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fields::party_key;

/// The closed set of loan agreement fields the recognizer is trained on.
///
/// Declaration order is the order fields are listed in results and records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Lender,
    Borrower,
    OriginalDate,
    MaturityDate,
    Currency,
    Principal,
    InterestRate,
}

impl FieldKind {
    /// Every field kind, in declaration order.
    pub const ALL: [FieldKind; 7] = [
        FieldKind::Lender,
        FieldKind::Borrower,
        FieldKind::OriginalDate,
        FieldKind::MaturityDate,
        FieldKind::Currency,
        FieldKind::Principal,
        FieldKind::InterestRate,
    ];

    /// Canonical snake_case name, as used by the model labels and records.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Lender => "lender",
            FieldKind::Borrower => "borrower",
            FieldKind::OriginalDate => "original_date",
            FieldKind::MaturityDate => "maturity_date",
            FieldKind::Currency => "currency",
            FieldKind::Principal => "principal",
            FieldKind::InterestRate => "interest_rate",
        }
    }

    /// Parse a model or annotation label.
    ///
    /// Matching is case-insensitive and treats `-` and spaces as `_`, so
    /// `"Interest Rate"` and `"INTEREST-RATE"` both map to `InterestRate`.
    pub fn parse(label: &str) -> Option<Self> {
        let canonical: String = label
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        FieldKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == canonical)
    }

    /// Whether this kind names a contracting party.
    pub fn is_party(&self) -> bool {
        matches!(self, FieldKind::Lender | FieldKind::Borrower)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A labeled span of the acquired text, as emitted by the recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpan {
    /// Field kind the model assigned.
    pub kind: FieldKind,
    /// Text of the span.
    pub text: String,
    /// Byte offset of the span start in the acquired text.
    pub start: usize,
    /// Byte offset one past the span end.
    pub end: usize,
    /// Mean token probability, when the model provides scores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl EntitySpan {
    pub fn new(kind: FieldKind, text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            start,
            end,
            score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

/// How a field entered the result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOrigin {
    /// Produced from a recognized entity span.
    #[default]
    Recognized,
    /// Recovered heuristically from text near another field.
    Recovered,
}

impl FieldOrigin {
    fn is_recognized(&self) -> bool {
        *self == FieldOrigin::Recognized
    }
}

/// A field value with the text it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedField {
    /// Original span text (whitespace-trimmed).
    pub raw: String,
    /// Canonical value.
    pub value: String,
    #[serde(default, skip_serializing_if = "FieldOrigin::is_recognized")]
    pub origin: FieldOrigin,
}

impl NormalizedField {
    pub fn new(raw: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            value: value.into(),
            origin: FieldOrigin::Recognized,
        }
    }

    pub fn recovered(raw: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            value: value.into(),
            origin: FieldOrigin::Recovered,
        }
    }
}

/// Fields extracted from one document, at most one per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult {
    fields: BTreeMap<FieldKind, NormalizedField>,
}

impl ExtractionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field unless its kind is already present.
    ///
    /// Returns `false` (and drops `field`) when the kind already has an entry;
    /// the first value for a kind is never replaced.
    pub fn insert_if_absent(&mut self, kind: FieldKind, field: NormalizedField) -> bool {
        if self.fields.contains_key(&kind) {
            return false;
        }
        self.fields.insert(kind, field);
        true
    }

    pub fn get(&self, kind: FieldKind) -> Option<&NormalizedField> {
        self.fields.get(&kind)
    }

    /// Normalized value for a kind, if present.
    pub fn value(&self, kind: FieldKind) -> Option<&str> {
        self.get(kind).map(|f| f.value.as_str())
    }

    pub fn contains(&self, kind: FieldKind) -> bool {
        self.fields.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldKind, &NormalizedField)> {
        self.fields.iter().map(|(kind, field)| (*kind, field))
    }

    /// Field kinds with no entry.
    pub fn missing(&self) -> Vec<FieldKind> {
        FieldKind::ALL
            .into_iter()
            .filter(|kind| !self.contains(*kind))
            .collect()
    }

    /// Flatten into the fixed seven-field record handed to the web layer.
    pub fn to_record(&self) -> LoanRecord {
        let value = |kind| self.value(kind).unwrap_or_default().to_string();
        LoanRecord {
            original_date: value(FieldKind::OriginalDate),
            lender: value(FieldKind::Lender),
            borrower: value(FieldKind::Borrower),
            principal: value(FieldKind::Principal),
            currency: value(FieldKind::Currency),
            interest_rate: value(FieldKind::InterestRate),
            maturity_date: value(FieldKind::MaturityDate),
        }
    }

    /// Check the result for issues a reviewer should look at.
    ///
    /// Absent fields are reported so they can be entered manually; nothing is
    /// filled in or altered here.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for kind in self.missing() {
            issues.push(format!("Missing {}", kind));
        }

        if let Some(principal) = self.get(FieldKind::Principal) {
            if principal.value.is_empty() {
                issues.push(format!("Principal has no digits (raw: '{}')", principal.raw));
            }
        }

        if self.parties_coincide() {
            issues.push("Lender and borrower resolve to the same party".to_string());
        }

        issues
    }

    /// Whether lender and borrower are both present and name the same party.
    pub fn parties_coincide(&self) -> bool {
        match (self.value(FieldKind::Lender), self.value(FieldKind::Borrower)) {
            (Some(lender), Some(borrower)) => {
                let key = party_key(lender);
                !key.is_empty() && key == party_key(borrower)
            }
            _ => false,
        }
    }
}

/// Flat record of the seven loan fields; absent fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub original_date: String,
    pub lender: String,
    pub borrower: String,
    pub principal: String,
    pub currency: String,
    pub interest_rate: String,
    pub maturity_date: String,
}

impl LoanRecord {
    /// Column names, in record order.
    pub const COLUMNS: [&'static str; 7] = [
        "original_date",
        "lender",
        "borrower",
        "principal",
        "currency",
        "interest_rate",
        "maturity_date",
    ];

    /// Values in [`LoanRecord::COLUMNS`] order.
    pub fn values(&self) -> [&str; 7] {
        [
            &self.original_date,
            &self.lender,
            &self.borrower,
            &self.principal,
            &self.currency,
            &self.interest_rate,
            &self.maturity_date,
        ]
    }
}
