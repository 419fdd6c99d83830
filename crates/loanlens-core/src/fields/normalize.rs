//! Value normalization: map trimmed span text to a canonical value.

use crate::models::FieldKind;

use super::patterns::{month_number, DATE_LONG, DATE_NUMERIC, NON_DIGIT, RATE};

/// Normalization applied to a field kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationRule {
    /// Month-name dates to `YYYY/MM/DD`, numeric dates to `DD/MM/YYYY`.
    Date,
    /// First percentage substring.
    Rate,
    /// Digits only.
    Principal,
    /// Unchanged.
    Verbatim,
}

impl NormalizationRule {
    /// The rule for a field kind.
    pub fn for_kind(kind: FieldKind) -> Self {
        match kind {
            FieldKind::OriginalDate | FieldKind::MaturityDate => NormalizationRule::Date,
            FieldKind::InterestRate => NormalizationRule::Rate,
            FieldKind::Principal => NormalizationRule::Principal,
            FieldKind::Lender | FieldKind::Borrower | FieldKind::Currency => {
                NormalizationRule::Verbatim
            }
        }
    }

    /// Apply the rule. Input that does not match is returned unchanged
    /// (whitespace-trimmed), except for `Principal` which may become empty.
    pub fn apply(&self, text: &str) -> String {
        let text = text.trim();
        match self {
            NormalizationRule::Date => normalize_date(text),
            NormalizationRule::Rate => RATE
                .find(text)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| text.to_string()),
            NormalizationRule::Principal => NON_DIGIT.replace_all(text, "").into_owned(),
            NormalizationRule::Verbatim => text.to_string(),
        }
    }
}

/// Normalize trimmed span text for a field kind.
pub fn normalize(kind: FieldKind, text: &str) -> String {
    NormalizationRule::for_kind(kind).apply(text)
}

fn normalize_date(text: &str) -> String {
    if let Some(caps) = DATE_LONG.captures(text) {
        if let (Ok(day), Some(month), Ok(year)) = (
            caps[1].parse::<u32>(),
            month_number(&caps[2]),
            caps[3].parse::<u32>(),
        ) {
            return format!("{:04}/{:02}/{:02}", year, month, day);
        }
    }

    if let Some(caps) = DATE_NUMERIC.captures(text) {
        let year = if caps[3].len() == 2 {
            format!("20{}", &caps[3])
        } else {
            caps[3].to_string()
        };
        if let (Ok(day), Ok(month), Ok(year)) = (
            caps[1].parse::<u32>(),
            caps[2].parse::<u32>(),
            year.parse::<u32>(),
        ) {
            return format!("{:02}/{:02}/{:04}", day, month, year);
        }
    }

    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_month_name_date() {
        assert_eq!(normalize(FieldKind::OriginalDate, "04 November 2009"), "2009/11/04");
        assert_eq!(
            normalize(FieldKind::MaturityDate, "on or before 1 March 2015"),
            "2015/03/01"
        );
    }

    #[test]
    fn test_numeric_date() {
        assert_eq!(normalize(FieldKind::OriginalDate, "31/12/20"), "31/12/2020");
        assert_eq!(normalize(FieldKind::MaturityDate, "5-1-2030"), "05/01/2030");
    }

    #[test]
    fn test_unparseable_date_is_kept() {
        assert_eq!(
            normalize(FieldKind::MaturityDate, " the fifth anniversary "),
            "the fifth anniversary"
        );
    }

    #[test]
    fn test_rate() {
        assert_eq!(normalize(FieldKind::InterestRate, "12.5%"), "12.5%");
        assert_eq!(normalize(FieldKind::InterestRate, "150%"), "150%");
        assert_eq!(normalize(FieldKind::InterestRate, "5.25% per annum"), "5.25%");
        assert_eq!(normalize(FieldKind::InterestRate, "five percent"), "five percent");
    }

    #[test]
    fn test_principal_keeps_digits() {
        assert_eq!(normalize(FieldKind::Principal, "$1,250,000.00"), "125000000");
        assert_eq!(normalize(FieldKind::Principal, "one million"), "");
    }

    #[test]
    fn test_verbatim_kinds() {
        assert_eq!(normalize(FieldKind::Currency, "USD"), "USD");
        assert_eq!(normalize(FieldKind::Lender, "Acme Corp"), "Acme Corp");
    }

    #[test]
    fn test_idempotent_on_canonical_values() {
        let cases = [
            (FieldKind::OriginalDate, "2009/11/04"),
            (FieldKind::MaturityDate, "31/12/2020"),
            (FieldKind::InterestRate, "12.5%"),
            (FieldKind::Principal, "125000000"),
            (FieldKind::Currency, "EUR"),
        ];
        for (kind, canonical) in cases {
            let once = normalize(kind, canonical);
            assert_eq!(once, canonical, "{kind}");
            assert_eq!(normalize(kind, &once), once, "{kind}");
        }
    }
}
