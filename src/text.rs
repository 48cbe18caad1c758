//! Text normalization shared by every scraper (spec §4.3 tie-breaks).
//!
//! Stored values are never case-folded; case-folding only happens in
//! [`crate::fingerprint`] when deriving fingerprint components.

/// Collapse runs of internal whitespace, trim the ends, and drop zero-width
/// characters (`U+200B`, `U+200C`, `U+200D`, `U+FEFF`) that some sources leak
/// into scraped text.
pub fn normalize(input: &str) -> String {
    let stripped: String = input
        .chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}'))
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase a value already passed through [`normalize`], for use only as a
/// fingerprint component. Never store the result.
pub fn fold_case(input: &str) -> String {
    input.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_internal_whitespace() {
        assert_eq!(normalize("Senior   Rust\tEngineer\n"), "Senior Rust Engineer");
    }

    #[test]
    fn trims_ends() {
        assert_eq!(normalize("  Acme Inc  "), "Acme Inc");
    }

    #[test]
    fn drops_zero_width_characters() {
        assert_eq!(normalize("Re\u{200B}mote"), "Remote");
    }

    #[test]
    fn preserves_case() {
        assert_eq!(normalize("Staff Engineer"), "Staff Engineer");
    }

    #[test]
    fn fold_case_lowercases() {
        assert_eq!(fold_case("Staff Engineer"), "staff engineer");
    }
}
