//! Canonicalization of OCR text for fuzzy comparison.
//!
//! Tesseract output on HUD text confuses a small, stable set of glyph pairs.
//! Folding both sides of a comparison through the same confusion table makes
//! the similarity ratio robust to those misreads.

use strsim::normalized_levenshtein;

/// Letter glyphs the engine regularly swaps with digits on this HUD font,
/// folded to the digit form.
fn fold_confusable(c: char) -> char {
    match c {
        'O' => '0',
        'I' | 'L' => '1',
        'Z' => '2',
        'S' => '5',
        'B' => '8',
        other => other,
    }
}

/// Canonicalizes a string for fuzzy comparison: uppercase, confusable
/// glyphs folded to digits, everything outside `[A-Z0-9]` dropped.
///
/// Idempotent: folding maps into the kept alphabet, so a second pass is a
/// no-op.
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_uppercase)
        .map(fold_confusable)
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}

/// Similarity ratio in `[0, 1]`; 1.0 means identical. Callers compare
/// normalized forms when the inputs are OCR-derived.
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_uppercases_and_strips() {
        assert_eq!(normalize("Auswen"), "AU5WEN");
        assert_eq!(normalize("  a-b/c  "), "A8C");
        assert_eq!(normalize("9/16"), "916");
    }

    #[test]
    fn test_normalize_folds_confusables() {
        // 0↔O and friends collapse to one form.
        assert_eq!(normalize("0O"), "00");
        assert_eq!(normalize("Il"), "11");
        assert_eq!(normalize("SZB"), "528");
    }

    #[test]
    fn test_normalize_idempotent() {
        for s in ["Auswen", "T3STUSER", "9/16", "", "b- Il O0"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_normalize_case_insensitive() {
        assert_eq!(normalize("TestUser"), normalize("TESTUSER"));
        assert_eq!(normalize("auswen"), normalize("AUSWEN"));
    }

    #[test]
    fn test_similarity_identical_is_one() {
        let n = normalize("TestUser");
        assert_eq!(similarity(&n, &n), 1.0);
    }

    #[test]
    fn test_similarity_tolerates_confused_glyphs() {
        // "T3STUSER" differs from "TESTUSER" by a single substitution.
        let a = normalize("T3STUSER");
        let b = normalize("TESTUSER");
        assert!(similarity(&a, &b) >= 0.8);
    }
}
