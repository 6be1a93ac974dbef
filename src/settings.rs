//! Game settings: timing constants, scoring knobs and source selection.

use serde::{Deserialize, Serialize};

use crate::store::{Store, SETTINGS_KEY};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Recognition language tag requested from the speech source.
    pub language: String,

    /// A segment with no new interim update for this long is auto-finalized:
    /// prolonged silence is treated as end-of-utterance.
    pub quiet_period_ms: u64,

    /// A segment still open after this long forces a source restart to work
    /// around recognizer fatigue. Accumulated text is carried over.
    pub segment_ceiling_ms: u64,

    /// Delay before restarting the source after it ends mid-session.
    pub restart_delay_ms: u64,

    /// Experience awarded for each segment finalized without a hit.
    pub experience_per_success: u64,

    /// Finalized lines a sink is expected to retain (display hint).
    pub transcript_history_limit: usize,

    /// Prefer the cloud speech backend when an endpoint and key are set.
    pub cloud_enabled: bool,

    /// WebSocket endpoint of the cloud speech backend. Empty = unconfigured.
    pub cloud_endpoint: String,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            language: "tr-TR".to_string(),
            quiet_period_ms: 1_500,
            segment_ceiling_ms: 22_000,
            restart_delay_ms: 300,
            experience_per_success: 10,
            transcript_history_limit: 20,
            cloud_enabled: false,
            cloud_endpoint: String::new(),
        }
    }
}

impl GameSettings {
    pub fn load(store: &Store) -> Self {
        store.load_or_default(SETTINGS_KEY)
    }

    pub fn save(&self, store: &Store) -> Result<(), crate::store::StoreError> {
        store.save(SETTINGS_KEY, self)
    }
}
