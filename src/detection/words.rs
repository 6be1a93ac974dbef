//! The configurable forbidden-word list.

use serde::{Deserialize, Serialize};

/// Words shipped as the starting list.
const DEFAULT_WORDS: [&str; 4] = ["elma", "bu", "yani", "şey"];

/// Ordered set of lowercase forbidden words.
///
/// Entries are unique; insertion order is preserved but carries no meaning.
/// Mutated only by explicit add/remove actions and persisted externally as
/// a plain JSON array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordList {
    words: Vec<String>,
}

impl Default for WordList {
    fn default() -> Self {
        Self {
            words: DEFAULT_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl WordList {
    pub fn empty() -> Self {
        Self { words: Vec::new() }
    }

    /// Build a list from raw user input, normalizing and deduplicating.
    pub fn from_raw<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::empty();
        for word in raw {
            list.add(word.as_ref());
        }
        list
    }

    /// Add a word. Returns `false` for blank input or duplicates.
    pub fn add(&mut self, raw: &str) -> bool {
        let word = normalize(raw);
        if word.is_empty() || self.words.contains(&word) {
            return false;
        }
        self.words.push(word);
        true
    }

    /// Remove a word. Returns `false` when it was not in the list.
    pub fn remove(&mut self, raw: &str) -> bool {
        let word = normalize(raw);
        let before = self.words.len();
        self.words.retain(|w| *w != word);
        self.words.len() != before
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_list_has_the_starter_words() {
        let list = WordList::default();
        assert_eq!(list.words(), ["elma", "bu", "yani", "şey"]);
    }

    #[test]
    fn add_normalizes_and_deduplicates() {
        let mut list = WordList::empty();
        assert!(list.add("  Elma "));
        assert!(!list.add("elma"));
        assert!(!list.add("ELMA"));
        assert!(!list.add("   "));
        assert_eq!(list.words(), ["elma"]);
    }

    #[test]
    fn remove_is_case_insensitive() {
        let mut list = WordList::from_raw(["elma", "şey"]);
        assert!(list.remove("ELMA"));
        assert!(!list.remove("elma"));
        assert_eq!(list.words(), ["şey"]);
    }

    #[test]
    fn persists_as_a_plain_array() {
        let list = WordList::from_raw(["elma", "bu"]);
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, r#"["elma","bu"]"#);

        let back: WordList = serde_json::from_str(&json).unwrap();
        assert_eq!(back.words(), list.words());
    }
}
