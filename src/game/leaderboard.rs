//! Score-sorted leaderboard, capped to the top entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stats::StatsSnapshot;

/// Entries kept after sorting.
const MAX_ENTRIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub player_name: String,
    pub score: u32,
    pub level: u32,
    pub accuracy: f64,
    pub best_streak: u32,
    pub words_detected: u64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result; returns the stored entry.
    ///
    /// Entries are sorted by score, best first, and only the top
    /// `MAX_ENTRIES` survive.
    pub fn add_entry(
        &mut self,
        player_name: &str,
        score: u32,
        stats: &StatsSnapshot,
    ) -> LeaderboardEntry {
        let entry = LeaderboardEntry {
            id: Uuid::new_v4(),
            player_name: player_name.to_string(),
            score,
            level: stats.level,
            accuracy: stats.accuracy,
            best_streak: stats.best_streak,
            words_detected: stats.total_words_detected,
            recorded_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        self.entries.sort_by(|a, b| b.score.cmp(&a.score));
        self.entries.truncate(MAX_ENTRIES);
        entry
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn top(&self, count: usize) -> &[LeaderboardEntry] {
        &self.entries[..count.min(self.entries.len())]
    }

    /// 1-based rank of the player's best entry.
    pub fn rank(&self, player_name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.player_name == player_name)
            .map(|i| i + 1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
