use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompletionError {
    #[error("score must be within 0..=100, got {score}")]
    ScoreOutOfRange { score: u32 },
}

/// XP and gem totals granted for finishing a lesson.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewards {
    pub xp: u32,
    pub gems: u32,
}

/// Outcome of a completed lesson session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    score: u8,
    time_spent_seconds: u64,
    total_xp: u32,
    total_gems: u32,
    tasks_completed: u32,
}

impl CompletionResult {
    /// Build a result, rejecting scores above 100.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::ScoreOutOfRange` if `score > 100`.
    pub fn new(
        score: u32,
        time_spent_seconds: u64,
        rewards: Rewards,
        tasks_completed: u32,
    ) -> Result<Self, CompletionError> {
        let score = u8::try_from(score)
            .ok()
            .filter(|s| *s <= 100)
            .ok_or(CompletionError::ScoreOutOfRange { score })?;

        Ok(Self {
            score,
            time_spent_seconds,
            total_xp: rewards.xp,
            total_gems: rewards.gems,
            tasks_completed,
        })
    }

    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn time_spent_seconds(&self) -> u64 {
        self.time_spent_seconds
    }

    #[must_use]
    pub fn total_xp(&self) -> u32 {
        self.total_xp
    }

    #[must_use]
    pub fn total_gems(&self) -> u32 {
        self.total_gems
    }

    #[must_use]
    pub fn tasks_completed(&self) -> u32 {
        self.tasks_completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_scores_above_hundred() {
        let err = CompletionResult::new(101, 10, Rewards::default(), 1).unwrap_err();
        assert_eq!(err, CompletionError::ScoreOutOfRange { score: 101 });
    }

    #[test]
    fn packages_rewards() {
        let result = CompletionResult::new(87, 42, Rewards { xp: 30, gems: 4 }, 2).unwrap();
        assert_eq!(result.score(), 87);
        assert_eq!(result.time_spent_seconds(), 42);
        assert_eq!(result.total_xp(), 30);
        assert_eq!(result.total_gems(), 4);
        assert_eq!(result.tasks_completed(), 2);
    }
}
