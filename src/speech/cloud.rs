//! Cloud speech backend adapter (WebSocket streaming).
//!
//! Connection flow:
//!
//! 1. Connect to the configured endpoint (bounded retries, exponential
//!    backoff), authenticating with a bearer token
//! 2. Complete the session handshake (`session.created` →
//!    `session.configure` → `session.updated`)
//! 3. Forward transcript events to the pipeline; relay audio frames from
//!    the injected feed, if one is attached
//!
//! Mid-session disconnects are transient: the adapter emits `Ended` and the
//! session state machine restarts it. Only permission, authentication and
//! exhausted-retry connection failures are fatal.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
};
use tokio_util::sync::CancellationToken;

use super::protocol::{ClientMessage, ErrorInfo, ServerMessage, SessionInfo};
use super::{SourceEvent, SpeechError, SpeechSource, UsageMeter};
use crate::settings::GameSettings;

/// Environment variable holding the backend API key.
pub const API_KEY_ENV: &str = "KAROT_SPEECH_API_KEY";

/// Timeout for the initial WebSocket handshake.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for each step of the session handshake.
const SESSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum connection attempts before giving up.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (doubles each retry).
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Capacity of the injected audio feed channel.
const AUDIO_FEED_CAPACITY: usize = 100;

/// Read the backend API key from the environment.
pub fn cloud_api_key() -> Option<String> {
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
}

#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub language: String,
}

impl CloudConfig {
    pub fn from_settings(settings: &GameSettings) -> Self {
        Self {
            endpoint: settings.cloud_endpoint.clone(),
            api_key: cloud_api_key(),
            language: settings.language.clone(),
        }
    }
}

type AudioReceiver = mpsc::Receiver<Vec<i16>>;

/// Streaming adapter for the cloud speech backend.
pub struct CloudSource {
    config: CloudConfig,
    audio_slot: Arc<Mutex<Option<AudioReceiver>>>,
    cancel: Mutex<Option<CancellationToken>>,
    usage: Option<Arc<Mutex<UsageMeter>>>,
}

impl CloudSource {
    pub fn new(config: CloudConfig) -> Self {
        Self {
            config,
            audio_slot: Arc::new(Mutex::new(None)),
            cancel: Mutex::new(None),
            usage: None,
        }
    }

    /// Meter streaming time against the monthly quota.
    pub fn with_usage_meter(mut self, meter: Arc<Mutex<UsageMeter>>) -> Self {
        self.usage = Some(meter);
        self
    }

    /// Attach an audio feed; the external capturer pushes PCM16 frames into
    /// the returned sender. The feed survives source restarts.
    pub fn audio_feed(&self) -> mpsc::Sender<Vec<i16>> {
        let (tx, rx) = mpsc::channel(AUDIO_FEED_CAPACITY);
        *lock_unpoisoned(&self.audio_slot) = Some(rx);
        tx
    }
}

impl SpeechSource for CloudSource {
    fn start(&self, events: mpsc::Sender<SourceEvent>) -> Result<(), SpeechError> {
        if self.config.endpoint.is_empty() {
            return Err(SpeechError::SourceUnavailable);
        }
        let Some(api_key) = self.config.api_key.clone() else {
            return Err(SpeechError::AuthenticationFailed(format!(
                "no API key configured (set {})",
                API_KEY_ENV
            )));
        };

        let cancel = CancellationToken::new();
        if let Some(previous) = lock_unpoisoned(&self.cancel).replace(cancel.clone()) {
            previous.cancel();
        }

        let audio_rx = lock_unpoisoned(&self.audio_slot).take();

        let session = CloudSession {
            endpoint: self.config.endpoint.clone(),
            api_key,
            language: self.config.language.clone(),
            events,
            cancel,
            audio_slot: self.audio_slot.clone(),
            usage: self.usage.clone(),
        };
        tokio::spawn(session.run(audio_rx));
        Ok(())
    }

    fn stop(&self) {
        if let Some(cancel) = lock_unpoisoned(&self.cancel).as_ref() {
            cancel.cancel();
        }
    }
}

/// One connection attempt cycle, owned by its background task.
struct CloudSession {
    endpoint: String,
    api_key: String,
    language: String,
    events: mpsc::Sender<SourceEvent>,
    cancel: CancellationToken,
    audio_slot: Arc<Mutex<Option<AudioReceiver>>>,
    usage: Option<Arc<Mutex<UsageMeter>>>,
}

impl CloudSession {
    async fn run(self, mut audio_rx: Option<AudioReceiver>) {
        let started_at = Instant::now();

        match self.connect_with_retries().await {
            Ok(ws) => {
                let _ = self.events.send(SourceEvent::Started).await;
                self.pump(ws, &mut audio_rx).await;
                self.record_usage(started_at.elapsed().as_secs_f64());
            }
            Err(e) if self.cancel.is_cancelled() => {
                log::debug!("cloud: connect abandoned after stop: {}", e);
            }
            Err(e) => {
                log::error!("cloud: giving up on connection: {}", e);
                let _ = self.events.send(SourceEvent::Failed(e)).await;
            }
        }

        // Hand the audio feed back so a restart can keep relaying.
        if let Some(rx) = audio_rx {
            *lock_unpoisoned(&self.audio_slot) = Some(rx);
        }
    }

    async fn connect_with_retries(&self) -> Result<WsStream, SpeechError> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                log::info!(
                    "cloud: retrying connection in {:?} (attempt {}/{})",
                    delay,
                    attempt + 1,
                    MAX_RETRIES
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.cancel.cancelled() => {
                        return Err(SpeechError::Disconnected("stopped".to_string()));
                    }
                }
            }

            match self.try_connect().await {
                Ok(ws) => return Ok(ws),
                // Credential and permission problems will not improve with
                // retries; surface them immediately.
                Err(e @ SpeechError::AuthenticationFailed(_))
                | Err(e @ SpeechError::PermissionDenied) => return Err(e),
                Err(e) => {
                    log::warn!("cloud: connection attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| SpeechError::ConnectionFailed("max retries exceeded".to_string())))
    }

    /// Single connection attempt: WebSocket handshake plus session setup.
    async fn try_connect(&self) -> Result<WsStream, SpeechError> {
        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| SpeechError::ConnectionFailed(e.to_string()))?;

        request.headers_mut().insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| SpeechError::AuthenticationFailed(e.to_string()))?,
        );

        log::info!("cloud: connecting to {}", self.endpoint);

        let (mut ws, _response) = timeout(CONNECTION_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| SpeechError::ConnectionFailed("connection timeout".to_string()))?
            .map_err(|e| SpeechError::ConnectionFailed(e.to_string()))?;

        let session = self.await_session(&mut ws, true).await?;
        log::info!("cloud: session created: {}", session.id);

        let configure = serde_json::to_string(&ClientMessage::configure(&self.language))
            .map_err(|e| SpeechError::ProtocolError(e.to_string()))?;
        ws.send(Message::Text(configure))
            .await
            .map_err(|e| SpeechError::ConnectionFailed(e.to_string()))?;

        let session = self.await_session(&mut ws, false).await?;
        log::debug!("cloud: session configured: {:?}", session.language);

        Ok(ws)
    }

    /// Wait for `session.created` (`created = true`) or `session.updated`.
    async fn await_session(
        &self,
        ws: &mut WsStream,
        created: bool,
    ) -> Result<SessionInfo, SpeechError> {
        timeout(SESSION_TIMEOUT, async {
            while let Some(msg) = ws.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(ServerMessage::SessionCreated { session }) if created => {
                            return Ok(session);
                        }
                        Ok(ServerMessage::SessionUpdated { session }) if !created => {
                            return Ok(session);
                        }
                        Ok(ServerMessage::Error { error }) => return Err(map_error(&error)),
                        Ok(_) => {
                            log::debug!("cloud: ignoring message during handshake");
                        }
                        Err(e) => log::warn!("cloud: failed to parse message: {}", e),
                    },
                    Ok(Message::Close(_)) => {
                        return Err(SpeechError::Disconnected(
                            "connection closed during handshake".to_string(),
                        ));
                    }
                    Err(e) => return Err(SpeechError::ProtocolError(e.to_string())),
                    _ => {} // ping/pong/binary
                }
            }
            Err(SpeechError::Disconnected("stream ended".to_string()))
        })
        .await
        .map_err(|_| SpeechError::ConnectionFailed("session handshake timeout".to_string()))?
    }

    /// Forward transcript events until the connection drops or we are
    /// stopped; relay audio frames in the same loop.
    async fn pump(&self, ws: WsStream, audio_rx: &mut Option<AudioReceiver>) {
        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    log::info!("cloud: disconnecting");
                    if let Ok(close) = serde_json::to_string(&ClientMessage::Close) {
                        let _ = write.send(Message::Text(close)).await;
                    }
                    let _ = write.close().await;
                    let _ = self.events.send(SourceEvent::Ended).await;
                    return;
                }

                samples = recv_audio(audio_rx) => {
                    match samples {
                        Some(samples) => {
                            let msg = ClientMessage::audio_append(&samples);
                            match serde_json::to_string(&msg) {
                                Ok(json) => {
                                    if let Err(e) = write.send(Message::Text(json)).await {
                                        log::warn!("cloud: audio send failed: {}", e);
                                    }
                                }
                                Err(e) => log::warn!("cloud: audio encode failed: {}", e),
                            }
                        }
                        None => {
                            log::debug!("cloud: audio feed closed");
                            *audio_rx = None;
                        }
                    }
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if self.handle_server_message(&text).await {
                                return;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            log::info!("cloud: closed by server");
                            let _ = self.events.send(SourceEvent::Ended).await;
                            return;
                        }
                        Some(Ok(_)) => {} // ping/pong/binary
                        Some(Err(e)) => {
                            log::warn!("cloud: websocket error: {}", e);
                            let _ = self.events.send(SourceEvent::Ended).await;
                            return;
                        }
                        None => {
                            let _ = self.events.send(SourceEvent::Ended).await;
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Returns `true` when the session must end.
    async fn handle_server_message(&self, text: &str) -> bool {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(ServerMessage::TranscriptInterim { text }) => {
                let _ = self.events.send(SourceEvent::Interim(text)).await;
                false
            }
            Ok(ServerMessage::TranscriptFinal { text }) => {
                let _ = self.events.send(SourceEvent::Final(text)).await;
                false
            }
            Ok(ServerMessage::Error { error }) => {
                let mapped = map_error(&error);
                match mapped {
                    SpeechError::PermissionDenied | SpeechError::AuthenticationFailed(_) => {
                        let _ = self.events.send(SourceEvent::Failed(mapped)).await;
                        true
                    }
                    other => {
                        // Transient backend hiccup; the segment pipeline is
                        // unaffected, keep listening.
                        log::warn!("cloud: backend error: {}", other);
                        false
                    }
                }
            }
            Ok(ServerMessage::SessionCreated { .. }) | Ok(ServerMessage::SessionUpdated { .. }) => {
                false
            }
            Ok(ServerMessage::Unknown) => false,
            Err(e) => {
                log::warn!("cloud: failed to parse message: {}", e);
                false
            }
        }
    }

    fn record_usage(&self, seconds: f64) {
        if let Some(meter) = &self.usage {
            lock_unpoisoned(meter).add_session(seconds);
        }
    }
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn recv_audio(rx: &mut Option<AudioReceiver>) -> Option<Vec<i16>> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn map_error(error: &ErrorInfo) -> SpeechError {
    match error.code.as_deref() {
        Some("permission_denied") | Some("not-allowed") => SpeechError::PermissionDenied,
        Some("unauthorized") | Some("invalid_api_key") => {
            SpeechError::AuthenticationFailed(error.message.clone())
        }
        _ => SpeechError::ProtocolError(error.message.clone()),
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
