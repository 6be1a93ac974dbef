//! Per-segment forbidden-word scanning.

use std::collections::BTreeSet;

use super::{token_matches, tokens};

/// Scan `text` for forbidden words not yet alerted on in this segment.
///
/// `alerted` is the segment-scoped detection record: every word returned is
/// inserted into it, so rechecking the same growing interim text cannot
/// alert twice for one word. The caller clears the set when the segment
/// finalizes.
///
/// Returns the newly detected words in word-list order. An empty word list
/// or empty text detects nothing.
pub fn scan(text: &str, words: &[String], alerted: &mut BTreeSet<String>) -> Vec<String> {
    if text.is_empty() || words.is_empty() {
        return Vec::new();
    }

    let mut fresh = Vec::new();
    for word in words {
        if alerted.contains(word) {
            continue;
        }
        if tokens(text).any(|t| token_matches(t, word)) {
            log::debug!("matcher: fresh hit for {:?}", word);
            alerted.insert(word.clone());
            fresh.push(word.clone());
        }
    }
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn detects_a_listed_word_once_per_segment() {
        let words = list(&["elma"]);
        let mut alerted = BTreeSet::new();

        assert_eq!(scan("elma ye", &words, &mut alerted), ["elma"]);
        // Same segment, grown text: no second alert
        assert!(scan("elma yedi", &words, &mut alerted).is_empty());

        // Segment finalized: the record clears, the next segment alerts again
        alerted.clear();
        assert_eq!(scan("elma aldım", &words, &mut alerted), ["elma"]);
    }

    #[test]
    fn matches_need_a_token_boundary() {
        let words = list(&["bu"]);
        let mut alerted = BTreeSet::new();

        assert_eq!(scan("bu", &words, &mut alerted), ["bu"]);

        alerted.clear();
        assert_eq!(scan("bunlar geldi", &words, &mut alerted), ["bu"]);

        alerted.clear();
        assert!(scan("abu dedi", &words, &mut alerted).is_empty());
    }

    #[test]
    fn boundary_may_follow_punctuation() {
        let words = list(&["elma"]);
        let mut alerted = BTreeSet::new();
        assert_eq!(scan("dedi ki: (elma)", &words, &mut alerted), ["elma"]);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let words = list(&["şey"]);
        let mut alerted = BTreeSet::new();
        assert_eq!(scan("ŞEY dedim", &words, &mut alerted), ["şey"]);
    }

    #[test]
    fn several_new_words_report_in_list_order() {
        let words = list(&["elma", "bu"]);
        let mut alerted = BTreeSet::new();
        assert_eq!(scan("bu elma kötü", &words, &mut alerted), ["elma", "bu"]);
    }

    #[test]
    fn empty_inputs_detect_nothing() {
        let mut alerted = BTreeSet::new();
        assert!(scan("", &list(&["elma"]), &mut alerted).is_empty());
        assert!(scan("elma", &[], &mut alerted).is_empty());
        assert!(alerted.is_empty());
    }
}
