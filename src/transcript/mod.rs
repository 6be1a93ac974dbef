//! Transcript ingestion: merging streaming speech fragments into segments.
//!
//! A *segment* is one utterance's lifetime: it begins with the first interim
//! fragment after a finalize (or session start), grows as the source revises
//! and extends the text, and ends when the source commits a final fragment,
//! when a quiet period elapses, or when the session stops.

mod accumulator;

pub use accumulator::{merge, SegmentAccumulator};
