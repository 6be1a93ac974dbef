//! Deterministic speech source driven by a prepared script.
//!
//! Used by tests and replay runs: the script is a sequence of recognition
//! events with optional pauses, delivered through the normal source
//! contract.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{SourceEvent, SpeechError, SpeechSource};

#[derive(Debug, Clone)]
pub enum ScriptStep {
    Interim(String),
    Final(String),
    /// Pause before the next step, in milliseconds.
    Wait(u64),
    /// End the recognizer session (the pipeline will restart the source).
    End,
}

impl ScriptStep {
    pub fn interim(text: &str) -> Self {
        Self::Interim(text.to_string())
    }

    pub fn fin(text: &str) -> Self {
        Self::Final(text.to_string())
    }
}

pub struct ScriptedSource {
    steps: Vec<ScriptStep>,
    cancel: Mutex<Option<CancellationToken>>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            cancel: Mutex::new(None),
        }
    }
}

impl SpeechSource for ScriptedSource {
    fn start(&self, events: mpsc::Sender<SourceEvent>) -> Result<(), SpeechError> {
        let cancel = CancellationToken::new();
        if let Some(previous) = lock(&self.cancel).replace(cancel.clone()) {
            previous.cancel();
        }

        let steps = self.steps.clone();
        tokio::spawn(async move {
            let _ = events.send(SourceEvent::Started).await;

            for step in steps {
                if cancel.is_cancelled() {
                    break;
                }
                match step {
                    ScriptStep::Interim(text) => {
                        let _ = events.send(SourceEvent::Interim(text)).await;
                    }
                    ScriptStep::Final(text) => {
                        let _ = events.send(SourceEvent::Final(text)).await;
                    }
                    ScriptStep::Wait(ms) => {
                        tokio::select! {
                            _ = tokio::time::sleep(std::time::Duration::from_millis(ms)) => {}
                            _ = cancel.cancelled() => break,
                        }
                    }
                    ScriptStep::End => {
                        let _ = events.send(SourceEvent::Ended).await;
                        return;
                    }
                }
            }

            // Script exhausted: stay "listening" silently until stopped, so
            // the pipeline does not loop restarting a finished script.
            cancel.cancelled().await;
            let _ = events.send(SourceEvent::Ended).await;
        });
        Ok(())
    }

    fn stop(&self) {
        if let Some(cancel) = lock(&self.cancel).as_ref() {
            cancel.cancel();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
