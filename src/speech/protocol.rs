//! Wire types for the cloud speech backend.
//!
//! The backend speaks JSON over a WebSocket:
//!
//! 1. Connect to the configured endpoint with a bearer token
//! 2. Receive `session.created`
//! 3. Send `session.configure` with language and interim preferences
//! 4. Stream audio via `audio.append`; receive `transcript.interim` /
//!    `transcript.final` events for the pipeline
//! 5. `session.close` for a clean shutdown

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// Session configuration sent after the session is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Recognition language tag, e.g. "tr-TR".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Ask for provisional results while an utterance is in progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interim_results: Option<bool>,

    /// Input audio format; "pcm16" for raw little-endian PCM.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_format: Option<String>,
}

impl SessionConfig {
    pub fn for_language(language: &str) -> Self {
        Self {
            language: Some(language.to_string()),
            interim_results: Some(true),
            audio_format: Some("pcm16".to_string()),
        }
    }
}

/// Session information returned by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub id: String,

    #[serde(default)]
    pub language: Option<String>,
}

/// Error information from the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorInfo {
    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Client Messages (sent TO the backend)
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "session.configure")]
    Configure { session: SessionConfig },

    /// Append audio to the recognizer's input buffer.
    #[serde(rename = "audio.append")]
    AudioAppend {
        /// Base64-encoded PCM16 audio data.
        audio: String,
    },

    /// Commit buffered audio, forcing a final transcript for the segment.
    #[serde(rename = "audio.commit")]
    AudioCommit,

    #[serde(rename = "session.close")]
    Close,
}

impl ClientMessage {
    pub fn configure(language: &str) -> Self {
        Self::Configure {
            session: SessionConfig::for_language(language),
        }
    }

    /// Build an append message from raw PCM16 samples (little-endian).
    pub fn audio_append(samples: &[i16]) -> Self {
        let bytes: Vec<u8> = samples.iter().flat_map(|&s| s.to_le_bytes()).collect();
        Self::AudioAppend {
            audio: STANDARD.encode(&bytes),
        }
    }
}

// ============================================================================
// Server Messages (received FROM the backend)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "session.created")]
    SessionCreated { session: SessionInfo },

    #[serde(rename = "session.updated")]
    SessionUpdated { session: SessionInfo },

    /// Provisional transcript for the in-progress utterance.
    #[serde(rename = "transcript.interim")]
    TranscriptInterim { text: String },

    /// Committed transcript ending the utterance.
    #[serde(rename = "transcript.final")]
    TranscriptFinal { text: String },

    #[serde(rename = "error")]
    Error { error: ErrorInfo },

    /// Catch-all so unknown message types never fail deserialization.
    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    pub fn is_error(&self) -> bool {
        matches!(self, ServerMessage::Error { .. })
    }

    pub fn error_info(&self) -> Option<&ErrorInfo> {
        match self {
            ServerMessage::Error { error } => Some(error),
            _ => None,
        }
    }
}
