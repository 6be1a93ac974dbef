//! Line-driven local speech source.
//!
//! Reads utterances from standard input, one per line, and exercises the
//! full source contract: each word of the line is emitted as a growing
//! interim fragment, then the whole line commits as the final. This is the
//! local stand-in for a platform recognizer in headless environments and
//! powers the demo binary.

use std::sync::Mutex;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{SourceEvent, SpeechError, SpeechSource};

/// Delay between simulated interim updates.
const INTERIM_DELAY: Duration = Duration::from_millis(120);

pub struct StdinSource {
    cancel: Mutex<Option<CancellationToken>>,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            cancel: Mutex::new(None),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSource for StdinSource {
    fn start(&self, events: mpsc::Sender<SourceEvent>) -> Result<(), SpeechError> {
        let cancel = CancellationToken::new();
        if let Some(previous) = lock(&self.cancel).replace(cancel.clone()) {
            previous.cancel();
        }

        tokio::spawn(async move {
            let _ = events.send(SourceEvent::Started).await;
            let mut lines = BufReader::new(tokio::io::stdin()).lines();

            loop {
                let line = tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = events.send(SourceEvent::Ended).await;
                        return;
                    }
                    line = lines.next_line() => line,
                };

                match line {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }

                        let mut running = String::new();
                        for word in line.split_whitespace() {
                            if !running.is_empty() {
                                running.push(' ');
                            }
                            running.push_str(word);
                            let _ = events.send(SourceEvent::Interim(running.clone())).await;

                            tokio::select! {
                                _ = tokio::time::sleep(INTERIM_DELAY) => {}
                                _ = cancel.cancelled() => {
                                    let _ = events.send(SourceEvent::Ended).await;
                                    return;
                                }
                            }
                        }
                        let _ = events.send(SourceEvent::Final(line)).await;
                    }
                    Ok(None) => {
                        log::info!("stdin source: input exhausted");
                        let _ = events
                            .send(SourceEvent::Failed(SpeechError::Disconnected(
                                "stdin closed".to_string(),
                            )))
                            .await;
                        return;
                    }
                    Err(e) => {
                        let _ = events
                            .send(SourceEvent::Failed(SpeechError::Disconnected(e.to_string())))
                            .await;
                        return;
                    }
                }
            }
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
