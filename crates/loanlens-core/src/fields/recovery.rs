//! Borrower recovery from text following the lender.

use tracing::debug;

use crate::models::{ExtractionResult, FieldKind, NormalizedField};

use super::patterns::BORROWER_DESIGNATION;
use super::trim::trim_span;

/// Characters after the lender mention searched for a borrower designation.
pub const RECOVERY_WINDOW_CHARS: usize = 300;

/// Recover a borrower the recognizer missed.
///
/// Applies only when the result has a lender and no borrower. The window is
/// the [`RECOVERY_WINDOW_CHARS`] characters following the first occurrence of
/// the lender's raw text; the first capitalized name followed by a
/// parenthetical containing "Borrower" becomes the borrower.
pub fn recover_borrower(text: &str, result: &ExtractionResult) -> Option<NormalizedField> {
    if result.contains(FieldKind::Borrower) {
        return None;
    }
    let lender = result.get(FieldKind::Lender)?;

    let Some(found) = text.find(&lender.raw) else {
        debug!("Lender text not found in document, skipping borrower recovery");
        return None;
    };
    let window = char_window(&text[found + lender.raw.len()..], RECOVERY_WINDOW_CHARS);

    let caps = BORROWER_DESIGNATION.captures(window)?;
    let raw = caps.get(0)?.as_str();
    let name = caps.get(1)?.as_str();
    let value = trim_span(FieldKind::Borrower, name);

    debug!("Recovered borrower '{}' near lender", value);
    Some(NormalizedField::recovered(raw, value))
}

/// Prefix of `text` holding at most `chars` characters.
fn char_window(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
