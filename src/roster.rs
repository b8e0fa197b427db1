//! Player roster
//!
//! Projection of the `player_list` the server attaches to messages. Each
//! update replaces the roster wholesale; the client only derives display
//! values from it (ordering, active count, its own standing).

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// One player's line in the roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    /// Server-assigned player id
    pub player_id: String,
    /// Display name
    #[serde(default)]
    pub player_name: String,
    /// Accumulated score
    #[serde(default)]
    pub score: i64,
    /// Questions this player buzzed on
    #[serde(default)]
    pub questions_answered: u32,
    /// Questions this player answered correctly
    #[serde(default)]
    pub questions_correct: u32,
    /// Whether the player is currently connected
    #[serde(default)]
    pub active: bool,
}

impl Standing {
    /// Share of answered questions that were correct, 0 if none were answered
    pub fn accuracy(&self) -> f64 {
        if self.questions_answered == 0 {
            0.
        } else {
            f64::from(self.questions_correct) / f64::from(self.questions_answered)
        }
    }
}

/// The latest roster pushed by the server
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    standings: Vec<Standing>,
}

impl Roster {
    /// Replaces the roster
    pub fn replace(&mut self, standings: Vec<Standing>) {
        self.standings = standings;
    }

    /// Standings ordered by score, highest first; ties keep server order
    pub fn ranked(&self) -> Vec<&Standing> {
        self.standings
            .iter()
            .sorted_by(|a, b| b.score.cmp(&a.score))
            .collect_vec()
    }

    /// Number of players currently connected
    pub fn active_count(&self) -> usize {
        self.standings.iter().filter(|s| s.active).count()
    }

    /// Standing of the player with `player_id`
    pub fn standing(&self, player_id: &str) -> Option<&Standing> {
        self.standings.iter().find(|s| s.player_id == player_id)
    }

    /// One-based rank of the player with `player_id`
    pub fn rank_of(&self, player_id: &str) -> Option<usize> {
        self.ranked()
            .iter()
            .position(|s| s.player_id == player_id)
            .map(|i| i + 1)
    }

    /// Number of players on the roster
    pub fn len(&self) -> usize {
        self.standings.len()
    }

    /// Whether the roster is empty
    pub fn is_empty(&self) -> bool {
        self.standings.is_empty()
    }
}
