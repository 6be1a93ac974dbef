//! Overlap-aware merging of streaming transcript fragments.
//!
//! Streaming recognizers frequently re-send partially overlapping text on
//! each interim update, and a forced source restart re-recognizes the tail
//! of the current utterance. Naive concatenation would duplicate words, so
//! merging checks for a shared prefix first and then for a word-level
//! overlap between the tail of the held text and the head of the incoming
//! fragment.
//!
//! # Merge rules
//!
//! 1. Empty held text: the incoming fragment wins as-is.
//! 2. The incoming fragment starts with the held text (case-insensitive):
//!    the source re-sent a superset, take the incoming fragment.
//! 3. The last 1–3 words of the held text equal the first 1–3 words of the
//!    incoming fragment (longest overlap wins): splice at the overlap.
//! 4. Otherwise concatenate with a single space.
//!
//! This is a heuristic. A missed overlap degrades to concatenation; a
//! spurious overlap is a known limitation.

/// Maximum word overlap considered when splicing fragments.
const MAX_WORD_OVERLAP: usize = 3;

/// Merge an incoming fragment into previously held text.
///
/// Pure function: no state, never fails. Output is trimmed.
pub fn merge(previous: &str, incoming: &str) -> String {
    let previous = previous.trim();
    let incoming = incoming.trim();

    if previous.is_empty() {
        return incoming.to_string();
    }
    if incoming.is_empty() {
        return previous.to_string();
    }

    if incoming.to_lowercase().starts_with(&previous.to_lowercase()) {
        return incoming.to_string();
    }

    let prev_words: Vec<&str> = previous.split_whitespace().collect();
    let new_words: Vec<&str> = incoming.split_whitespace().collect();

    let max_overlap = MAX_WORD_OVERLAP.min(prev_words.len()).min(new_words.len());
    for overlap in (1..=max_overlap).rev() {
        let tail = prev_words[prev_words.len() - overlap..]
            .join(" ")
            .to_lowercase();
        let head = new_words[..overlap].join(" ").to_lowercase();

        if tail == head {
            log::debug!("merge: spliced at {}-word overlap", overlap);
            return format!("{} {}", previous, new_words[overlap..].join(" "))
                .trim_end()
                .to_string();
        }
    }

    format!("{} {}", previous, incoming)
}

/// Accumulates the text of the active utterance segment.
///
/// Holds two pieces, mirroring how a restart-prone streaming source behaves:
///
/// - `carried`: text saved across source restarts (the source forgets its
///   context on restart, we must not)
/// - `last_interim`: the most recent provisional fragment, replaced wholesale
///   on every interim update
///
/// The segment's best-known text at any moment is `merge(carried,
/// last_interim)`.
#[derive(Debug, Clone, Default)]
pub struct SegmentAccumulator {
    carried: String,
    last_interim: String,
}

impl SegmentAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a provisional fragment and return the segment's current text.
    pub fn apply_interim(&mut self, text: &str) -> String {
        self.last_interim = text.trim().to_string();
        self.current()
    }

    /// Best-known full text of the segment so far.
    pub fn current(&self) -> String {
        merge(&self.carried, &self.last_interim)
    }

    pub fn is_empty(&self) -> bool {
        self.carried.is_empty() && self.last_interim.is_empty()
    }

    /// Fold the pending interim into the carried text.
    ///
    /// Called before a forced source restart so that the new recognizer
    /// session extends the utterance instead of replacing it.
    pub fn carry_over(&mut self) {
        if !self.last_interim.is_empty() {
            log::debug!("accumulator: carrying interim across restart");
            self.carried = self.current();
            self.last_interim.clear();
        }
    }

    /// Merge a committed fragment into the segment and drain it.
    pub fn take_final(&mut self, final_text: &str) -> String {
        let full = merge(&self.current(), final_text);
        self.clear();
        full
    }

    /// Drain the segment as-is (quiet-period finalize, session stop).
    pub fn flush(&mut self) -> String {
        let full = self.current();
        self.clear();
        full
    }

    fn clear(&mut self) {
        self.carried.clear();
        self.last_interim.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_into_empty_takes_incoming() {
        assert_eq!(merge("", "merhaba"), "merhaba");
        assert_eq!(merge("   ", "merhaba"), "merhaba");
    }

    #[test]
    fn merge_repetition_is_idempotent() {
        assert_eq!(merge("bir iki", "bir iki"), "bir iki");
    }

    #[test]
    fn merge_superset_replaces_prefix() {
        assert_eq!(merge("bir elma", "bir elma yedim"), "bir elma yedim");
        // Case-insensitive prefix check
        assert_eq!(merge("Bir Elma", "bir elma yedim"), "bir elma yedim");
    }

    #[test]
    fn merge_splices_single_word_overlap() {
        assert_eq!(merge("bugün hava", "hava güzel"), "bugün hava güzel");
    }

    #[test]
    fn merge_prefers_longest_overlap() {
        assert_eq!(
            merge("dün akşam çok güzel", "çok güzel bir film izledim"),
            "dün akşam çok güzel bir film izledim"
        );
    }

    #[test]
    fn merge_falls_back_to_concatenation() {
        assert_eq!(merge("elma", "armut"), "elma armut");
    }

    #[test]
    fn merge_ignores_incoming_whitespace() {
        assert_eq!(merge("elma", "   "), "elma");
    }

    #[test]
    fn interim_updates_replace_each_other() {
        let mut acc = SegmentAccumulator::new();
        assert_eq!(acc.apply_interim("bir"), "bir");
        assert_eq!(acc.apply_interim("bir elma"), "bir elma");
        assert_eq!(acc.apply_interim("bir elma yedim"), "bir elma yedim");
    }

    #[test]
    fn carry_over_survives_new_interims() {
        let mut acc = SegmentAccumulator::new();
        acc.apply_interim("bugün hava");
        acc.carry_over();

        // The restarted source re-recognizes with overlap
        assert_eq!(acc.apply_interim("hava güzel"), "bugün hava güzel");
    }

    #[test]
    fn take_final_drains_the_segment() {
        let mut acc = SegmentAccumulator::new();
        acc.apply_interim("bir elma");
        assert_eq!(acc.take_final("bir elma yedim"), "bir elma yedim");
        assert!(acc.is_empty());
        assert_eq!(acc.current(), "");
    }

    #[test]
    fn flush_returns_pending_text_once() {
        let mut acc = SegmentAccumulator::new();
        acc.apply_interim("yarım kalan cümle");
        assert_eq!(acc.flush(), "yarım kalan cümle");
        assert_eq!(acc.flush(), "");
    }

    #[test]
    fn carry_over_on_empty_interim_is_a_noop() {
        let mut acc = SegmentAccumulator::new();
        acc.carry_over();
        assert!(acc.is_empty());
    }
}
