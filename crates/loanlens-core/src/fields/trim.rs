//! Span trimming: cut party names at the first descriptive separator.

use crate::models::FieldKind;

/// Separators that end a party name, in priority order.
pub const PARTY_SEPARATORS: [&str; 5] = [",", " (", " and ", ";", "\n"];

/// Trim the text of a recognized span.
///
/// Party spans often run on into a description ("Acme Corp, a Delaware
/// corporation"). The first separator of [`PARTY_SEPARATORS`], in list order,
/// that occurs in the text cuts it at its first occurrence. Other kinds are
/// only whitespace-trimmed.
pub fn trim_span(kind: FieldKind, text: &str) -> String {
    let text = text.trim();
    if kind.is_party() {
        trim_party(text)
    } else {
        text.to_string()
    }
}

fn trim_party(text: &str) -> String {
    PARTY_SEPARATORS
        .iter()
        .find_map(|sep| text.split_once(sep).map(|(head, _)| head.trim()))
        .unwrap_or(text)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_trims_party_description() {
        assert_eq!(
            trim_span(FieldKind::Lender, "Acme Corp, a Delaware corporation"),
            "Acme Corp"
        );
        assert_eq!(
            trim_span(FieldKind::Borrower, "  Beta Ltd (the \"Borrower\")  "),
            "Beta Ltd"
        );
    }

    #[test]
    fn test_separator_priority_is_list_order() {
        // " and " appears first in the text, but "," has priority
        assert_eq!(
            trim_span(FieldKind::Lender, "Smith and Sons Bank, N.A."),
            "Smith and Sons Bank"
        );
        assert_eq!(trim_span(FieldKind::Lender, "Smith and Sons"), "Smith");
        assert_eq!(trim_span(FieldKind::Borrower, "Gamma LLC; Delta Inc"), "Gamma LLC");
        assert_eq!(trim_span(FieldKind::Borrower, "Gamma LLC\nDelta Inc"), "Gamma LLC");
    }

    #[test]
    fn test_other_kinds_only_strip_whitespace() {
        assert_eq!(trim_span(FieldKind::Principal, " 1,000,000 "), "1,000,000");
        assert_eq!(trim_span(FieldKind::Currency, "US Dollars (USD)"), "US Dollars (USD)");
    }

    #[test]
    fn test_no_separator_keeps_text() {
        assert_eq!(trim_span(FieldKind::Lender, "First National Bank"), "First National Bank");
        assert_eq!(trim_span(FieldKind::Lender, ""), "");
    }
}
