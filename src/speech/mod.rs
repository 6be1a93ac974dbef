//! Speech sources: the external recognizers feeding the pipeline.
//!
//! A source is a black box satisfying one contract: after a successful
//! `start` it emits [`SourceEvent`]s in order on the channel it was given —
//! `Started` once listening, zero or more `Interim` fragments per utterance
//! segment, `Final` when a segment commits, `Ended` when the recognizer
//! session ends (the pipeline restarts it), and `Failed` for fatal errors
//! that must end the game session.
//!
//! # Fallback Strategy
//!
//! Sources are tried through an explicit chain ([`FallbackSource`]): the
//! first one that starts wins. A source that cannot start reports a
//! distinguishable [`SpeechError`] instead of hanging; if no source starts,
//! the chain surfaces the last error.

mod cloud;
pub mod protocol;
mod scripted;
mod stdin;
mod usage;

pub use cloud::{CloudConfig, CloudSource};
pub use scripted::{ScriptStep, ScriptedSource};
pub use stdin::StdinSource;
pub use usage::{shared as usage_meter, UsageMeter, UsageRecord, UsageSummary};

use std::sync::Arc;

use tokio::sync::mpsc;

/// Events a running source delivers to the pipeline, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// The recognizer is listening.
    Started,
    /// The recognizer session ended; transient, the pipeline restarts it.
    Ended,
    /// Provisional text for the in-progress segment, revised on each call.
    Interim(String),
    /// Committed text ending the segment.
    Final(String),
    /// Fatal failure; the game session must stop and surface it.
    Failed(SpeechError),
}

/// Errors a speech source can raise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    /// Microphone or recognizer access was refused. Fatal, never retried.
    PermissionDenied,
    /// No recognizer is present or configured in this environment.
    SourceUnavailable,
    /// Could not reach the backend (after retries).
    ConnectionFailed(String),
    /// The backend rejected our credentials.
    AuthenticationFailed(String),
    /// The backend sent something we could not handle.
    ProtocolError(String),
    /// The connection dropped unexpectedly.
    Disconnected(String),
}

impl std::fmt::Display for SpeechError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeechError::PermissionDenied => {
                write!(f, "Microphone access was not allowed")
            }
            SpeechError::SourceUnavailable => {
                write!(f, "No speech recognition source is available")
            }
            SpeechError::ConnectionFailed(e) => {
                write!(f, "Failed to connect to the speech backend: {}", e)
            }
            SpeechError::AuthenticationFailed(e) => write!(f, "Authentication failed: {}", e),
            SpeechError::ProtocolError(e) => write!(f, "Speech backend protocol error: {}", e),
            SpeechError::Disconnected(e) => write!(f, "Speech source disconnected: {}", e),
        }
    }
}

impl std::error::Error for SpeechError {}

/// A speech recognizer adapter.
///
/// `start` either begins delivering events on `events` or returns a
/// `SpeechError` right away; failures discovered asynchronously arrive as
/// `SourceEvent::Failed`. `stop` is idempotent; a stopped source emits
/// `Ended` and then goes quiet.
pub trait SpeechSource: Send + Sync + 'static {
    fn start(&self, events: mpsc::Sender<SourceEvent>) -> Result<(), SpeechError>;
    fn stop(&self);
}

/// Tries each source in order until one starts.
pub struct FallbackSource {
    chain: Vec<Arc<dyn SpeechSource>>,
}

impl FallbackSource {
    pub fn new(chain: Vec<Arc<dyn SpeechSource>>) -> Self {
        Self { chain }
    }
}

impl SpeechSource for FallbackSource {
    fn start(&self, events: mpsc::Sender<SourceEvent>) -> Result<(), SpeechError> {
        let mut last_error = SpeechError::SourceUnavailable;
        for (index, source) in self.chain.iter().enumerate() {
            match source.start(events.clone()) {
                Ok(()) => {
                    log::info!("speech: source {} of {} started", index + 1, self.chain.len());
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("speech: source {} failed to start: {}", index + 1, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    fn stop(&self) {
        // Stop is idempotent on every adapter, so stopping the whole chain
        // is safe regardless of which member actually started.
        for source in &self.chain {
            source.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Refusing(SpeechError);

    impl SpeechSource for Refusing {
        fn start(&self, _events: mpsc::Sender<SourceEvent>) -> Result<(), SpeechError> {
            Err(self.0.clone())
        }
        fn stop(&self) {}
    }

    struct Accepting;

    impl SpeechSource for Accepting {
        fn start(&self, _events: mpsc::Sender<SourceEvent>) -> Result<(), SpeechError> {
            Ok(())
        }
        fn stop(&self) {}
    }

    #[tokio::test]
    async fn chain_falls_back_past_a_refusing_source() {
        let chain = FallbackSource::new(vec![
            Arc::new(Refusing(SpeechError::SourceUnavailable)),
            Arc::new(Accepting),
        ]);
        let (tx, _rx) = mpsc::channel(4);
        assert!(chain.start(tx).is_ok());
    }

    #[tokio::test]
    async fn chain_reports_the_last_error() {
        let chain = FallbackSource::new(vec![
            Arc::new(Refusing(SpeechError::SourceUnavailable)),
            Arc::new(Refusing(SpeechError::AuthenticationFailed("bad key".into()))),
        ]);
        let (tx, _rx) = mpsc::channel(4);
        assert_eq!(
            chain.start(tx),
            Err(SpeechError::AuthenticationFailed("bad key".into()))
        );
    }

    #[tokio::test]
    async fn empty_chain_is_unavailable() {
        let chain = FallbackSource::new(vec![]);
        let (tx, _rx) = mpsc::channel(4);
        assert_eq!(chain.start(tx), Err(SpeechError::SourceUnavailable));
    }

    #[test]
    fn errors_render_user_facing_messages() {
        assert!(SpeechError::PermissionDenied.to_string().contains("Microphone"));
        assert!(SpeechError::ConnectionFailed("timeout".into())
            .to_string()
            .contains("timeout"));
        assert!(SpeechError::AuthenticationFailed("invalid key".into())
            .to_string()
            .contains("invalid key"));
    }
}
