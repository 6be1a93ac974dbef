//! Transcript highlighting: typed emphasis spans over the original text.
//!
//! The presentation sink decides how emphasis is rendered; the pipeline only
//! marks which stretches of the line contain forbidden words.

use super::{token_matches, tokens};

/// One run of text, either emphasized (contains a forbidden word) or plain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub emphasized: bool,
}

/// A transcript line split into emphasis spans.
///
/// Concatenating the spans reproduces the input text exactly.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HighlightedLine {
    pub spans: Vec<Span>,
}

impl HighlightedLine {
    /// The line without any markup.
    pub fn plain(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Render with `open`/`close` markers around emphasized spans.
    pub fn render(&self, open: &str, close: &str) -> String {
        let mut out = String::new();
        for span in &self.spans {
            if span.emphasized {
                out.push_str(open);
                out.push_str(&span.text);
                out.push_str(close);
            } else {
                out.push_str(&span.text);
            }
        }
        out
    }

    pub fn has_emphasis(&self) -> bool {
        self.spans.iter().any(|s| s.emphasized)
    }
}

/// Mark every token of `text` that starts with any listed word.
///
/// The whole token is emphasized ("elmalar" for the list word "elma"), and a
/// token matched by several list words is emphasized exactly once. An empty
/// word list yields a single plain span: the identity transform.
pub fn highlight(text: &str, words: &[String]) -> HighlightedLine {
    let mut line = HighlightedLine::default();
    if text.is_empty() {
        return line;
    }
    if words.is_empty() {
        line.spans.push(Span {
            text: text.to_string(),
            emphasized: false,
        });
        return line;
    }

    let mut current = String::new();
    let mut current_emphasis = false;

    for (piece, is_token) in pieces(text) {
        let emphasized = is_token && words.iter().any(|w| token_matches(piece, w));
        if emphasized != current_emphasis && !current.is_empty() {
            line.spans.push(Span {
                text: std::mem::take(&mut current),
                emphasized: current_emphasis,
            });
        }
        current_emphasis = emphasized;
        current.push_str(piece);
    }
    if !current.is_empty() {
        line.spans.push(Span {
            text: current,
            emphasized: current_emphasis,
        });
    }
    line
}

/// Split `text` into alternating token / separator pieces, preserving all
/// characters.
fn pieces(text: &str) -> Vec<(&str, bool)> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_token = None::<bool>;

    for (idx, c) in text.char_indices() {
        let token_char = c.is_alphanumeric();
        match in_token {
            Some(t) if t == token_char => {}
            Some(t) => {
                out.push((&text[start..idx], t));
                start = idx;
                in_token = Some(token_char);
            }
            None => in_token = Some(token_char),
        }
    }
    if let Some(t) = in_token {
        out.push((&text[start..], t));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn emphasized(line: &HighlightedLine) -> Vec<&str> {
        line.spans
            .iter()
            .filter(|s| s.emphasized)
            .map(|s| s.text.as_str())
            .collect()
    }

    #[test]
    fn empty_word_list_is_identity() {
        let line = highlight("bir elma yedim", &[]);
        assert_eq!(line.spans.len(), 1);
        assert!(!line.has_emphasis());
        assert_eq!(line.plain(), "bir elma yedim");
    }

    #[test]
    fn marks_the_whole_matched_token() {
        let line = highlight("elmalar tatlı", &list(&["elma"]));
        assert_eq!(emphasized(&line), ["elmalar"]);
        assert_eq!(line.plain(), "elmalar tatlı");
    }

    #[test]
    fn mid_token_occurrences_stay_plain() {
        let line = highlight("abu dedi", &list(&["bu"]));
        assert!(!line.has_emphasis());
    }

    #[test]
    fn marks_every_occurrence() {
        let line = highlight("elma ve elma", &list(&["elma"]));
        assert_eq!(emphasized(&line), ["elma", "elma"]);
    }

    #[test]
    fn nested_list_words_emphasize_once() {
        // "bu" and "bunu" both match the token "bunu"; it is marked once.
        let line = highlight("bunu dedi", &list(&["bu", "bunu"]));
        assert_eq!(emphasized(&line), ["bunu"]);
    }

    #[test]
    fn render_wraps_emphasized_spans() {
        let line = highlight("bir elma", &list(&["elma"]));
        assert_eq!(line.render("<<", ">>"), "bir <<elma>>");
    }

    #[test]
    fn spans_reassemble_the_input() {
        let text = "yani... bu ŞEY, elmalar!";
        let line = highlight(text, &list(&["elma", "bu", "şey", "yani"]));
        assert_eq!(line.plain(), text);
        assert_eq!(emphasized(&line), ["yani", "bu", "ŞEY", "elmalar"]);
    }
}
