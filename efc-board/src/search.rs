//! Phrase search and ranking
//!
//! Pure functions over a phrase snapshot. Matching is a case- and
//! diacritic-insensitive substring test; "café", "CAFE" and "cafe" all
//! normalize to the same key.

use efc_common::Phrase;
use std::cmp::Ordering;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lower-case, decompose (NFD) and drop combining marks
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Shortest first; equal lengths in dictionary order
///
/// Dictionary order compares normalized keys, so "Árbol" sorts among the
/// a's and capitals mix with lower case. Raw text settles exact ties.
fn by_length_then_text(a: &Phrase, b: &Phrase) -> Ordering {
    a.text
        .chars()
        .count()
        .cmp(&b.text.chars().count())
        .then_with(|| normalize(&a.text).cmp(&normalize(&b.text)))
        .then_with(|| a.text.cmp(&b.text))
}

fn matching<'a>(phrases: &'a [Phrase], needle: &'a str) -> impl Iterator<Item = &'a Phrase> + 'a {
    phrases
        .iter()
        .filter(move |p| normalize(&p.text).contains(needle))
}

/// Phrases containing `query`, shortest first, then lexicographic
///
/// A query that normalizes to nothing (empty, or only combining marks)
/// yields nothing; browsing goes through [`most_used`].
pub fn search(phrases: &[Phrase], query: &str) -> Vec<Phrase> {
    let needle = normalize(query);
    if needle.is_empty() {
        return Vec::new();
    }

    let mut results: Vec<Phrase> = matching(phrases, &needle).cloned().collect();
    results.sort_by(by_length_then_text);
    results
}

/// Top `limit` phrases with non-zero usage, most used first
pub fn most_used(phrases: &[Phrase], limit: usize) -> Vec<Phrase> {
    let mut used: Vec<Phrase> = phrases
        .iter()
        .filter(|p| p.usage_count > 0)
        .cloned()
        .collect();
    used.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
    used.truncate(limit);
    used
}

/// Listing for the management screen
///
/// Same filter as [`search`], but an empty query lists everything. Ordered
/// by usage count descending; ties keep library order.
pub fn manage_listing(phrases: &[Phrase], query: &str) -> Vec<Phrase> {
    let needle = normalize(query.trim());
    let mut listed: Vec<Phrase> = if needle.is_empty() {
        phrases.to_vec()
    } else {
        matching(phrases, &needle).cloned().collect()
    };
    listed.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
    listed
}

/// Phrase whose normalized text equals the normalized `query`
pub fn find_exact<'a>(phrases: &'a [Phrase], query: &str) -> Option<&'a Phrase> {
    let needle = normalize(query.trim());
    if needle.is_empty() {
        return None;
    }
    phrases.iter().find(|p| normalize(p.text.trim()) == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use efc_common::PhraseKind;

    fn phrase(id: &str, text: &str, usage: u64) -> Phrase {
        let mut p = Phrase::new(id, text, vec![], PhraseKind::Phrase);
        p.usage_count = usage;
        p
    }

    fn texts(phrases: &[Phrase]) -> Vec<&str> {
        phrases.iter().map(|p| p.text.as_str()).collect()
    }

    #[test]
    fn test_normalize_strips_case_and_accents() {
        assert_eq!(normalize("Café"), "cafe");
        assert_eq!(normalize("CAFÉ"), "cafe");
        assert_eq!(normalize("Sí, por favor"), "si, por favor");
        assert_eq!(normalize("Niño"), "nino");
    }

    #[test]
    fn test_search_is_accent_and_case_insensitive() {
        let phrases = vec![phrase("1", "Café", 0), phrase("2", "Agua", 0)];

        assert_eq!(texts(&search(&phrases, "cafe")), vec!["Café"]);
        assert_eq!(texts(&search(&phrases, "CAFE")), vec!["Café"]);
        assert_eq!(texts(&search(&phrases, "café")), vec!["Café"]);
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let phrases = vec![phrase("1", "Café", 3)];
        assert!(search(&phrases, "").is_empty());
    }

    #[test]
    fn test_search_matches_substrings() {
        let phrases = vec![phrase("1", "Quiero agua", 0), phrase("2", "Hola", 0)];
        assert_eq!(texts(&search(&phrases, "agu")), vec!["Quiero agua"]);
        assert!(search(&phrases, "aguaa").is_empty());
    }

    #[test]
    fn test_shorter_matches_rank_first() {
        let phrases = vec![phrase("1", "Sí, por favor", 0), phrase("2", "Sí", 0)];
        assert_eq!(texts(&search(&phrases, "sí")), vec!["Sí", "Sí, por favor"]);
    }

    #[test]
    fn test_equal_length_ties_break_lexicographically() {
        let phrases = vec![
            phrase("1", "mano", 0),
            phrase("2", "gana", 0),
            phrase("3", "lana", 0),
        ];
        assert_eq!(texts(&search(&phrases, "an")), vec!["gana", "lana", "mano"]);
    }

    #[test]
    fn test_ties_ignore_case_and_accents() {
        let phrases = vec![
            phrase("1", "Zorra", 0),
            phrase("2", "aguas", 0),
            phrase("3", "bolsa", 0),
            phrase("4", "Árbol", 0),
        ];
        assert_eq!(
            texts(&search(&phrases, "a")),
            vec!["aguas", "Árbol", "bolsa", "Zorra"]
        );
    }

    #[test]
    fn test_lone_combining_mark_returns_nothing() {
        let phrases = vec![phrase("1", "Hola", 0), phrase("2", "Adiós", 0)];
        assert!(search(&phrases, "\u{0301}").is_empty());
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // "ñaña" is 4 chars but 6 bytes
        let phrases = vec![phrase("1", "ñaña", 0), phrase("2", "nanas", 0)];
        assert_eq!(texts(&search(&phrases, "nan")), vec!["ñaña", "nanas"]);
    }

    #[test]
    fn test_most_used_filters_sorts_and_limits() {
        let phrases = vec![
            phrase("1", "a", 0),
            phrase("2", "b", 5),
            phrase("3", "c", 15),
            phrase("4", "d", 10),
        ];
        assert_eq!(texts(&most_used(&phrases, 12)), vec!["c", "d", "b"]);
        assert_eq!(texts(&most_used(&phrases, 2)), vec!["c", "d"]);
    }

    #[test]
    fn test_manage_listing_lists_all_for_empty_query() {
        let phrases = vec![
            phrase("1", "Hola", 1),
            phrase("2", "Adiós", 4),
            phrase("3", "Gracias", 1),
        ];
        assert_eq!(
            texts(&manage_listing(&phrases, "")),
            vec!["Adiós", "Hola", "Gracias"]
        );
        assert_eq!(texts(&manage_listing(&phrases, "ADIOS")), vec!["Adiós"]);
    }

    #[test]
    fn test_find_exact_ignores_case_and_accents() {
        let phrases = vec![phrase("1", "Sí", 0), phrase("2", "Sí, por favor", 0)];
        assert_eq!(find_exact(&phrases, "si").map(|p| p.id.as_str()), Some("1"));
        assert!(find_exact(&phrases, "s").is_none());
        assert!(find_exact(&phrases, "  ").is_none());
    }
}
