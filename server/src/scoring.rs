//! Per-color score aggregation and winner resolution.

use shared::{Color, GameResults, Winner};
use std::collections::HashMap;

/// Latest reported score for each color. Later reports overwrite earlier ones.
#[derive(Debug, Clone, Default)]
pub struct ScoreBoard {
    scores: HashMap<Color, u32>,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, color: Color, score: u32) {
        self.scores.insert(color, score);
    }

    pub fn get(&self, color: &Color) -> Option<u32> {
        self.scores.get(color).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Picks the highest score. A unique leader wins; a shared top score is a
    /// tie. Returns `None` when nothing has been reported.
    pub fn resolve(&self) -> Option<GameResults> {
        let max_score = self.scores.values().copied().max()?;

        let mut leaders = self
            .scores
            .iter()
            .filter(|(_, score)| **score == max_score)
            .map(|(color, _)| *color);

        let winner = match (leaders.next(), leaders.next()) {
            (Some(color), None) => Winner::Color(color),
            _ => Winner::Tie,
        };

        Some(GameResults {
            winner_score: max_score,
            winner,
        })
    }
}
