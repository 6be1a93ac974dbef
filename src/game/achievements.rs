//! Achievement progress and unlock tracking.
//!
//! The catalog is fixed; progress is persisted and merged back into the
//! catalog on load so stale or unknown stored entries cannot corrupt it.
//! Unlocking is one-shot: an achievement reports its unlock exactly once.

use serde::{Deserialize, Serialize};

use super::stats::StatsSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub unlocked: bool,
    pub progress: u64,
    pub target: u64,
}

fn catalog() -> Vec<Achievement> {
    let entry = |id: &str, name: &str, description: &str, icon: &str, target: u64| Achievement {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        unlocked: false,
        progress: 0,
        target,
    };
    vec![
        entry("first_word", "İlk Adım", "İlk yasaklı kelimeyi tespit et", "🎯", 1),
        entry("word_master", "Kelime Ustası", "10 yasaklı kelime tespit et", "🏆", 10),
        entry("perfect_game", "Mükemmel Oyun", "Hatasız bir oyun tamamla", "⭐", 1),
        entry("hour_warrior", "Saat Savaşçısı", "Toplam 1 saat oyun oyna", "⏰", 3600),
        entry("streak_king", "Seri Kralı", "10 ardışık başarılı kelime", "🔥", 10),
        entry("level_10", "Seviye 10", "Seviye 10'a ulaş", "💎", 10),
    ]
}

#[derive(Debug, Clone)]
pub struct AchievementBook {
    achievements: Vec<Achievement>,
}

impl Default for AchievementBook {
    fn default() -> Self {
        Self {
            achievements: catalog(),
        }
    }
}

impl AchievementBook {
    /// Restore from persisted entries, keyed into the fixed catalog.
    ///
    /// Unknown ids are dropped, missing ones come back at zero progress.
    pub fn from_saved(saved: Vec<Achievement>) -> Self {
        let mut book = Self::default();
        for entry in saved {
            if let Some(slot) = book.achievements.iter_mut().find(|a| a.id == entry.id) {
                slot.unlocked = entry.unlocked;
                slot.progress = entry.progress.min(slot.target);
            } else {
                log::warn!("achievements: dropping unknown stored id {:?}", entry.id);
            }
        }
        book
    }

    pub fn all(&self) -> &[Achievement] {
        &self.achievements
    }

    pub fn unlocked_count(&self) -> usize {
        self.achievements.iter().filter(|a| a.unlocked).count()
    }

    pub fn total_count(&self) -> usize {
        self.achievements.len()
    }

    /// Update the absolute-metric achievements from a stats snapshot.
    /// Returns ids unlocked by this update.
    pub fn observe_stats(&mut self, stats: &StatsSnapshot) -> Vec<String> {
        let mut unlocked = Vec::new();
        unlocked.extend(self.raise_to("first_word", stats.total_forbidden_hits.min(1)));
        unlocked.extend(self.raise_to("word_master", stats.total_forbidden_hits));
        unlocked.extend(self.raise_to("streak_king", stats.current_streak as u64));
        unlocked.extend(self.raise_to("level_10", stats.level as u64));
        unlocked
    }

    /// Accumulate play time (seconds) at session end.
    pub fn record_play_time(&mut self, seconds: f64) -> Vec<String> {
        self.advance("hour_warrior", seconds.max(0.0).floor() as u64)
    }

    /// A session finished with attempts and no forbidden hits.
    pub fn record_clean_session(&mut self) -> Vec<String> {
        self.advance("perfect_game", 1)
    }

    pub fn reset(&mut self) {
        for achievement in &mut self.achievements {
            achievement.unlocked = false;
            achievement.progress = 0;
        }
    }

    /// Progress toward an absolute metric: progress only ever rises.
    fn raise_to(&mut self, id: &str, value: u64) -> Option<String> {
        self.update(id, |progress| progress.max(value))
    }

    /// Progress by accumulation.
    fn advance(&mut self, id: &str, amount: u64) -> Vec<String> {
        if amount == 0 {
            return Vec::new();
        }
        self.update(id, |progress| progress.saturating_add(amount))
            .into_iter()
            .collect()
    }

    fn update(&mut self, id: &str, next: impl FnOnce(u64) -> u64) -> Option<String> {
        let achievement = self.achievements.iter_mut().find(|a| a.id == id)?;
        if achievement.unlocked {
            return None;
        }
        achievement.progress = next(achievement.progress).min(achievement.target);
        if achievement.progress >= achievement.target {
            achievement.unlocked = true;
            log::info!("achievements: unlocked {:?}", achievement.id);
            return Some(achievement.id.clone());
        }
        None
    }
}
