//! Effect runner: executes the state machine's side effects.
//!
//! Timer effects become delayed events on the state loop's channel; the
//! reducer filters out instances that were superseded in the meantime, so
//! the runner never needs to cancel a sleep. Source effects drive the
//! injected [`SpeechSource`], bridging its events back into the loop
//! stamped with the owning session's ID.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::speech::{SourceEvent, SpeechSource};
use crate::state_machine::{Effect, Event};

/// Runs effects asynchronously; completion events come back via `tx`.
pub trait EffectRunner: Send + Sync + 'static {
    fn spawn(&self, effect: Effect, tx: mpsc::Sender<Event>);
}

/// Runner backed by a speech source and tokio timers.
pub struct SourceEffectRunner {
    source: Arc<dyn SpeechSource>,
}

impl SourceEffectRunner {
    pub fn new(source: Arc<dyn SpeechSource>) -> Arc<Self> {
        Arc::new(Self { source })
    }
}

impl EffectRunner for SourceEffectRunner {
    fn spawn(&self, effect: Effect, tx: mpsc::Sender<Event>) {
        match effect {
            Effect::StartSource { id } => {
                start_source(self.source.clone(), id, tx);
            }

            Effect::StopSource => {
                self.source.stop();
            }

            Effect::RestartSource { id, delay } => {
                let source = self.source.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    log::debug!("effects: restarting source for session {}", id);
                    start_source(source, id, tx);
                });
            }

            Effect::StartQuietTimer { id, timer, duration } => {
                tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    let _ = tx.send(Event::QuietTimeout { id, timer }).await;
                });
            }

            Effect::StartCeilingTimer { id, timer, duration } => {
                tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    let _ = tx.send(Event::CeilingTimeout { id, timer }).await;
                });
            }

            // Pipeline output is handled in the state loop, not here
            other => unreachable!("effect {:?} must be handled in run_state_loop", other),
        }
    }
}

/// Start the source and forward its events, stamped with the session ID.
fn start_source(source: Arc<dyn SpeechSource>, id: Uuid, tx: mpsc::Sender<Event>) {
    let (bridge_tx, mut bridge_rx) = mpsc::channel::<SourceEvent>(32);

    if let Err(error) = source.start(bridge_tx) {
        log::warn!("effects: source failed to start: {}", error);
        tokio::spawn(async move {
            let _ = tx.send(Event::SourceFailed { id, error }).await;
        });
        return;
    }

    tokio::spawn(async move {
        while let Some(event) = bridge_rx.recv().await {
            let event = match event {
                SourceEvent::Started => Event::SourceStarted { id },
                SourceEvent::Ended => Event::SourceEnded { id },
                SourceEvent::Interim(text) => Event::Interim { id, text },
                SourceEvent::Final(text) => Event::Final { id, text },
                SourceEvent::Failed(error) => Event::SourceFailed { id, error },
            };
            if tx.send(event).await.is_err() {
                log::debug!("effects: state loop closed, dropping source events");
                break;
            }
        }
    });
}
