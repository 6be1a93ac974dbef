//! Session statistics: words, streaks, experience and levels.
//!
//! Totals persist across sessions; only the playing flag and the session
//! duration reset when a new session starts. The unit of accounting is the
//! finalized segment: one "word detected" per non-empty segment, one
//! success when such a segment closes without a forbidden hit, one
//! forbidden hit (and a streak reset) per freshly detected word.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Experience required to go from level 1 to level 2.
const BASE_EXPERIENCE_THRESHOLD: u64 = 100;

/// Threshold multiplier per level, floored after each level-up.
const LEVEL_GROWTH: f64 = 1.5;

/// The persisted portion of the stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsRecord {
    pub session_duration_secs: f64,
    pub total_words_detected: u64,
    pub total_forbidden_hits: u64,
    pub current_streak: u32,
    pub best_streak: u32,
    pub level: u32,
    pub experience: u64,
    pub experience_to_next_level: u64,
}

impl Default for StatsRecord {
    fn default() -> Self {
        Self {
            session_duration_secs: 0.0,
            total_words_detected: 0,
            total_forbidden_hits: 0,
            current_streak: 0,
            best_streak: 0,
            level: 1,
            experience: 0,
            experience_to_next_level: BASE_EXPERIENCE_THRESHOLD,
        }
    }
}

/// Snapshot handed to presentation sinks and achievements.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub is_playing: bool,
    pub session_secs: f64,
    pub total_words_detected: u64,
    pub total_forbidden_hits: u64,
    pub current_streak: u32,
    pub best_streak: u32,
    pub level: u32,
    pub experience: u64,
    pub experience_to_next_level: u64,
    pub accuracy: f64,
}

/// Outcome of a successful (hit-free) segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessReport {
    pub streak: u32,
    /// Levels reached by this award, in order. One entry per threshold
    /// crossed: a single large award can level up more than once.
    pub level_ups: Vec<u32>,
}

/// Mutable stats state for the running game.
#[derive(Debug)]
pub struct GameStats {
    record: StatsRecord,
    session_started: Option<Instant>,
    session_words: u64,
    session_hits: u64,
}

impl GameStats {
    pub fn new() -> Self {
        Self::from_record(StatsRecord::default())
    }

    /// Restore from a persisted record, repairing values a corrupt store
    /// could feed us.
    pub fn from_record(mut record: StatsRecord) -> Self {
        if record.experience_to_next_level == 0 {
            log::warn!("stats: zero level threshold in stored record, using default");
            record.experience_to_next_level = BASE_EXPERIENCE_THRESHOLD;
        }
        if record.level == 0 {
            record.level = 1;
        }
        Self {
            record,
            session_started: None,
            session_words: 0,
            session_hits: 0,
        }
    }

    pub fn record(&self) -> &StatsRecord {
        &self.record
    }

    pub fn start_session(&mut self) {
        self.session_started = Some(Instant::now());
        self.session_words = 0;
        self.session_hits = 0;
        self.record.session_duration_secs = 0.0;
    }

    /// Close the session and return its duration in seconds.
    pub fn stop_session(&mut self) -> f64 {
        let elapsed = self
            .session_started
            .take()
            .map(|s| s.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.record.session_duration_secs = elapsed;
        elapsed
    }

    pub fn is_in_session(&self) -> bool {
        self.session_started.is_some()
    }

    pub fn record_word_detected(&mut self) {
        self.record.total_words_detected += 1;
        self.session_words += 1;
    }

    pub fn record_forbidden_hit(&mut self) {
        self.record.total_forbidden_hits += 1;
        self.session_hits += 1;
        self.record.current_streak = 0;
    }

    pub fn record_success(&mut self, award: u64) -> SuccessReport {
        self.record.current_streak += 1;
        if self.record.current_streak > self.record.best_streak {
            self.record.best_streak = self.record.current_streak;
        }
        SuccessReport {
            streak: self.record.current_streak,
            level_ups: self.add_experience(award),
        }
    }

    /// Award experience, cascading level-ups while the threshold is met.
    pub fn add_experience(&mut self, amount: u64) -> Vec<u32> {
        self.record.experience += amount;

        let mut level_ups = Vec::new();
        while self.record.experience >= self.record.experience_to_next_level {
            self.record.experience -= self.record.experience_to_next_level;
            self.record.level += 1;
            self.record.experience_to_next_level =
                ((self.record.experience_to_next_level as f64) * LEVEL_GROWTH).floor() as u64;
            level_ups.push(self.record.level);
            log::info!(
                "stats: level up to {} (next threshold {})",
                self.record.level,
                self.record.experience_to_next_level
            );
        }
        level_ups
    }

    /// Share of attempts without a forbidden hit, in percent.
    ///
    /// Defined as 100 with nothing attempted; saturates at 0 when a single
    /// segment carried several hits.
    pub fn accuracy(&self) -> f64 {
        let words = self.record.total_words_detected as f64;
        if words == 0.0 {
            return 100.0;
        }
        let hits = self.record.total_forbidden_hits as f64;
        (((words - hits) / words) * 100.0).max(0.0)
    }

    /// True when the just-finished or running session had attempts and no
    /// hits.
    pub fn session_clean(&self) -> bool {
        self.session_words > 0 && self.session_hits == 0
    }

    /// Zero the counters; best streak, level and experience survive a reset.
    pub fn reset(&mut self) {
        self.record.session_duration_secs = 0.0;
        self.record.total_words_detected = 0;
        self.record.total_forbidden_hits = 0;
        self.record.current_streak = 0;
        self.session_words = 0;
        self.session_hits = 0;
    }

    pub fn snapshot(&self, is_playing: bool) -> StatsSnapshot {
        let session_secs = match self.session_started {
            Some(started) if is_playing => started.elapsed().as_secs_f64(),
            _ => self.record.session_duration_secs,
        };
        StatsSnapshot {
            is_playing,
            session_secs,
            total_words_detected: self.record.total_words_detected,
            total_forbidden_hits: self.record.total_forbidden_hits,
            current_streak: self.record.current_streak,
            best_streak: self.record.best_streak,
            level: self.record.level,
            experience: self.record.experience,
            experience_to_next_level: self.record.experience_to_next_level,
            accuracy: self.accuracy(),
        }
    }
}

impl Default for GameStats {
    fn default() -> Self {
        Self::new()
    }
}
