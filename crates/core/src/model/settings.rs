use serde::Deserialize;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("starting hearts must be > 0")]
    InvalidStartingHearts,

    #[error("speed bonus window must be > 0 seconds")]
    InvalidSpeedBonusWindow,

    #[error("passing score must be between 1 and 100, got {0}")]
    InvalidPassingScore(u8),

    #[error("perfect answer window must be > 0 milliseconds")]
    InvalidPerfectAnswerWindow,

    #[error("streak celebration threshold must be > 0")]
    InvalidStreakThreshold,
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Tunables for compiling and scoring a lesson session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonSettings {
    starting_hearts: u32,
    default_task_xp: u32,
    default_task_gems: u32,
    speed_bonus_window_secs: u64,
    speed_bonus: u32,
    streak_bonus_per_answer: u32,
    default_passing_score: u8,
    perfect_answer_window_ms: u64,
    celebrate_streak_at: u32,
}

impl Default for LessonSettings {
    /// - 5 hearts per session
    /// - 10 XP / 2 gems per task unless the task says otherwise
    /// - +10 for finishing within 5 minutes, +5 per answer of the longest streak
    /// - 70% to pass a final assessment
    fn default() -> Self {
        Self {
            starting_hearts: 5,
            default_task_xp: 10,
            default_task_gems: 2,
            speed_bonus_window_secs: 300,
            speed_bonus: 10,
            streak_bonus_per_answer: 5,
            default_passing_score: 70,
            perfect_answer_window_ms: 5_000,
            celebrate_streak_at: 5,
        }
    }
}

impl LessonSettings {
    #[must_use]
    pub fn starting_hearts(&self) -> u32 {
        self.starting_hearts
    }

    #[must_use]
    pub fn default_task_xp(&self) -> u32 {
        self.default_task_xp
    }

    #[must_use]
    pub fn default_task_gems(&self) -> u32 {
        self.default_task_gems
    }

    /// Lessons finished strictly faster than this earn the speed bonus.
    #[must_use]
    pub fn speed_bonus_window_secs(&self) -> u64 {
        self.speed_bonus_window_secs
    }

    #[must_use]
    pub fn speed_bonus(&self) -> u32 {
        self.speed_bonus
    }

    #[must_use]
    pub fn streak_bonus_per_answer(&self) -> u32 {
        self.streak_bonus_per_answer
    }

    #[must_use]
    pub fn default_passing_score(&self) -> u8 {
        self.default_passing_score
    }

    #[must_use]
    pub fn perfect_answer_window_ms(&self) -> u64 {
        self.perfect_answer_window_ms
    }

    #[must_use]
    pub fn celebrate_streak_at(&self) -> u32 {
        self.celebrate_streak_at
    }
}

/// Partially specified settings, as read from a config file.
///
/// Missing fields fall back to [`LessonSettings::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LessonSettingsDraft {
    pub starting_hearts: Option<u32>,
    pub default_task_xp: Option<u32>,
    pub default_task_gems: Option<u32>,
    pub speed_bonus_window_secs: Option<u64>,
    pub speed_bonus: Option<u32>,
    pub streak_bonus_per_answer: Option<u32>,
    pub default_passing_score: Option<u8>,
    pub perfect_answer_window_ms: Option<u64>,
    pub celebrate_streak_at: Option<u32>,
}

impl LessonSettingsDraft {
    /// Validate the draft against the defaults.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` when a provided value is out of range.
    pub fn validate(self) -> Result<LessonSettings, SettingsError> {
        let defaults = LessonSettings::default();
        let settings = LessonSettings {
            starting_hearts: self.starting_hearts.unwrap_or(defaults.starting_hearts),
            default_task_xp: self.default_task_xp.unwrap_or(defaults.default_task_xp),
            default_task_gems: self.default_task_gems.unwrap_or(defaults.default_task_gems),
            speed_bonus_window_secs: self
                .speed_bonus_window_secs
                .unwrap_or(defaults.speed_bonus_window_secs),
            speed_bonus: self.speed_bonus.unwrap_or(defaults.speed_bonus),
            streak_bonus_per_answer: self
                .streak_bonus_per_answer
                .unwrap_or(defaults.streak_bonus_per_answer),
            default_passing_score: self
                .default_passing_score
                .unwrap_or(defaults.default_passing_score),
            perfect_answer_window_ms: self
                .perfect_answer_window_ms
                .unwrap_or(defaults.perfect_answer_window_ms),
            celebrate_streak_at: self
                .celebrate_streak_at
                .unwrap_or(defaults.celebrate_streak_at),
        };

        if settings.starting_hearts == 0 {
            return Err(SettingsError::InvalidStartingHearts);
        }
        if settings.speed_bonus_window_secs == 0 {
            return Err(SettingsError::InvalidSpeedBonusWindow);
        }
        if !(1..=100).contains(&settings.default_passing_score) {
            return Err(SettingsError::InvalidPassingScore(
                settings.default_passing_score,
            ));
        }
        if settings.perfect_answer_window_ms == 0 {
            return Err(SettingsError::InvalidPerfectAnswerWindow);
        }
        if settings.celebrate_streak_at == 0 {
            return Err(SettingsError::InvalidStreakThreshold);
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_draft_yields_defaults() {
        let settings = LessonSettingsDraft::default().validate().unwrap();
        assert_eq!(settings, LessonSettings::default());
        assert_eq!(settings.starting_hearts(), 5);
        assert_eq!(settings.speed_bonus_window_secs(), 300);
    }

    #[test]
    fn zero_hearts_rejected() {
        let draft = LessonSettingsDraft {
            starting_hearts: Some(0),
            ..LessonSettingsDraft::default()
        };
        assert_eq!(draft.validate(), Err(SettingsError::InvalidStartingHearts));
    }

    #[test]
    fn passing_score_above_hundred_rejected() {
        let draft = LessonSettingsDraft {
            default_passing_score: Some(101),
            ..LessonSettingsDraft::default()
        };
        assert_eq!(draft.validate(), Err(SettingsError::InvalidPassingScore(101)));
    }

    #[test]
    fn overrides_apply() {
        let draft = LessonSettingsDraft {
            starting_hearts: Some(3),
            default_task_xp: Some(15),
            ..LessonSettingsDraft::default()
        };
        let settings = draft.validate().unwrap();
        assert_eq!(settings.starting_hearts(), 3);
        assert_eq!(settings.default_task_xp(), 15);
        assert_eq!(settings.default_task_gems(), 2);
    }
}
