//! Game state: session statistics, achievements, players and leaderboard.

mod achievements;
mod leaderboard;
mod players;
mod stats;

pub use achievements::{Achievement, AchievementBook};
pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use players::{Player, Roster};
pub use stats::{GameStats, StatsRecord, StatsSnapshot, SuccessReport};
