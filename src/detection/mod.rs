//! Forbidden-word detection and transcript highlighting.
//!
//! Matching is token-based: a list word matches wherever a token (a maximal
//! alphanumeric run) starts with it, case-insensitively. Trailing characters
//! on the token are tolerated, so the list word "elma" matches "elmalar",
//! while "bu" does not match inside "abu". Detection and highlighting share
//! the boundary rule but are otherwise independent: highlighting never
//! mutates detection state.

mod highlight;
mod matcher;
mod words;

pub use highlight::{highlight, HighlightedLine, Span};
pub use matcher::scan;
pub use words::WordList;

/// True when `token` counts as an occurrence of the (lowercase) list word.
fn token_matches(token: &str, word: &str) -> bool {
    token.to_lowercase().starts_with(word)
}

/// Maximal alphanumeric runs of `text`, in order.
fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
}
