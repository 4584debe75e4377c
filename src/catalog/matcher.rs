//! Analyte-name normalization and graduated-cutoff fuzzy matching.

use strsim::normalized_levenshtein;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Similarity cutoffs tried strictest-first. The graduated strategy trades
/// precision (no unrelated analyte at 0.85) against recall (OCR noise and
/// abbreviation variants still land by 0.70).
pub const SIMILARITY_CUTOFFS: [f64; 4] = [0.85, 0.80, 0.75, 0.70];

/// Canonical form used for all name comparisons: Unicode-decomposed with
/// combining marks stripped, lowercased, whitespace collapsed to single
/// spaces.
pub fn normalize_name(raw: &str) -> String {
    let folded: String = raw
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity between two already-normalized names.
///
/// Edit-distance ratio, taken as the better of the raw strings and their
/// token-sorted forms so "colesterol total" and "total colesterol" compare
/// as equals.
pub fn similarity(a: &str, b: &str) -> f64 {
    let direct = normalized_levenshtein(a, b);
    let sorted = normalized_levenshtein(&sort_tokens(a), &sort_tokens(b));
    direct.max(sorted)
}

fn sort_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Best key among `keys` for `query`, under the graduated cutoffs.
///
/// `keys` must be normalized and in a stable order. Returns the index of the
/// single best-scoring key at the first cutoff level that yields at least one
/// hit; ties break toward the earlier key, so results are deterministic for
/// a given catalog.
pub fn best_fuzzy_index(query: &str, keys: &[String]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, key) in keys.iter().enumerate() {
        let score = similarity(query, key);
        match best {
            Some((_, s)) if score <= s => {}
            _ => best = Some((i, score)),
        }
    }
    let (idx, score) = best?;
    SIMILARITY_CUTOFFS
        .iter()
        .find(|cutoff| score >= **cutoff)
        .map(|_| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_diacritics_and_case() {
        assert_eq!(normalize_name("Glicose"), "glicose");
        assert_eq!(normalize_name("  Hemácias   Totais "), "hemacias totais");
        assert_eq!(normalize_name("MÉDICO"), "medico");
    }

    #[test]
    fn similarity_tolerates_token_order() {
        let a = normalize_name("Colesterol Total");
        let b = normalize_name("Total Colesterol");
        assert!(similarity(&a, &b) > 0.99);
    }

    #[test]
    fn english_spelling_clears_loosest_cutoff() {
        let keys = vec!["hemoglobina".to_string()];
        assert_eq!(best_fuzzy_index("hemoglobin", &keys), Some(0));
    }

    #[test]
    fn distinct_analytes_do_not_cross_match_strictly() {
        // "colesterol total" vs "colesterol hdl" shares a long prefix but is
        // a clinically different analyte; the score must stay below 0.85.
        assert!(similarity("colesterol total", "colesterol hdl") < 0.85);
    }

    #[test]
    fn unrelated_name_matches_nothing() {
        let keys = vec!["glicose".to_string(), "creatinina".to_string()];
        assert_eq!(best_fuzzy_index("vitamina d", &keys), None);
    }

    #[test]
    fn tie_breaks_toward_first_key() {
        let keys = vec!["glicose".to_string(), "glicose".to_string()];
        assert_eq!(best_fuzzy_index("glicose", &keys), Some(0));
    }
}
