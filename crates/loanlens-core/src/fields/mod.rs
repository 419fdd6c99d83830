//! Field post-processing: trimming, normalization and borrower recovery.

pub mod normalize;
pub mod patterns;
pub mod recovery;
pub mod trim;

pub use normalize::{normalize, NormalizationRule};
pub use recovery::{recover_borrower, RECOVERY_WINDOW_CHARS};
pub use trim::{trim_span, PARTY_SEPARATORS};

/// Comparison key for party names: lowercase ASCII letters and digits only.
pub fn party_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_party_key() {
        assert_eq!(party_key("ACME Corp."), "acmecorp");
        assert_eq!(party_key("Acme  Corp"), "acmecorp");
        assert_eq!(party_key("---"), "");
    }
}
