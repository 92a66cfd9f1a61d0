use serde::{Deserialize, Serialize};

/// Running correctness counters for one lesson session.
///
/// Only the progression reducer mutates this value, through [`QuizStats::record`].
/// `correct_answers + mistakes == total_questions` holds after every call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizStats {
    total_questions: u32,
    correct_answers: u32,
    mistakes: u32,
    streak: u32,
    longest_streak: u32,
}

impl QuizStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one evaluated submission.
    pub fn record(&mut self, correct: bool) {
        self.total_questions = self.total_questions.saturating_add(1);
        if correct {
            self.correct_answers = self.correct_answers.saturating_add(1);
            self.streak = self.streak.saturating_add(1);
            self.longest_streak = self.longest_streak.max(self.streak);
        } else {
            self.mistakes = self.mistakes.saturating_add(1);
            self.streak = 0;
        }
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn mistakes(&self) -> u32 {
        self.mistakes
    }

    #[must_use]
    pub fn streak(&self) -> u32 {
        self.streak
    }

    #[must_use]
    pub fn longest_streak(&self) -> u32 {
        self.longest_streak
    }

    /// Percentage of correct answers, 100 when nothing was asked.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total_questions == 0 {
            return 100.0;
        }
        100.0 * f64::from(self.correct_answers) / f64::from(self.total_questions)
    }
}
