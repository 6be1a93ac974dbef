//! The player roster with penalty scores.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub score: u32,
}

/// Players are mutated only by explicit actions: add, remove, penalize,
/// reset. Scores never go below zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player with a zero score. Blank names are rejected.
    pub fn add(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.players.push(Player {
            name: name.to_string(),
            score: 0,
        });
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<Player> {
        if index < self.players.len() {
            Some(self.players.remove(index))
        } else {
            None
        }
    }

    /// Add one penalty point; returns the player's new score.
    pub fn add_penalty(&mut self, index: usize) -> Option<u32> {
        let player = self.players.get_mut(index)?;
        player.score += 1;
        log::info!("players: penalty for {:?} (now {})", player.name, player.score);
        Some(player.score)
    }

    pub fn reset_scores(&mut self) {
        for player in &mut self.players {
            player.score = 0;
        }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
