//! Score aggregation and completion summary.

use crate::model::{CompletionError, CompletionResult, LessonSettings, QuizStats, Rewards, Task};

/// Score in `0..=100`: accuracy plus a speed bonus plus a streak bonus, capped.
///
/// The speed bonus applies when `elapsed_seconds` is strictly below the
/// configured window.
#[must_use]
pub fn aggregate_score(stats: &QuizStats, elapsed_seconds: u64, settings: &LessonSettings) -> u8 {
    let speed_bonus = if elapsed_seconds < settings.speed_bonus_window_secs() {
        f64::from(settings.speed_bonus())
    } else {
        0.0
    };
    let streak_bonus =
        f64::from(settings.streak_bonus_per_answer()) * f64::from(stats.longest_streak());
    let raw = (stats.accuracy() + speed_bonus + streak_bonus).round();
    // accuracy is never negative, so only the upper bound needs clamping
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let score = raw.clamp(0.0, 100.0) as u8;
    score
}

/// Sum task rewards, filling in defaults for tasks that declare none.
#[must_use]
pub fn aggregate_rewards(tasks: &[Task], settings: &LessonSettings) -> Rewards {
    tasks.iter().fold(Rewards::default(), |acc, task| Rewards {
        xp: acc
            .xp
            .saturating_add(task.xp.unwrap_or(settings.default_task_xp())),
        gems: acc
            .gems
            .saturating_add(task.gems.unwrap_or(settings.default_task_gems())),
    })
}

/// Package the completion payload.
///
/// # Errors
///
/// Returns `CompletionError::ScoreOutOfRange` if `score > 100`.
pub fn summarize(
    score: u8,
    elapsed_seconds: u64,
    rewards: Rewards,
    tasks_completed: u32,
) -> Result<CompletionResult, CompletionError> {
    CompletionResult::new(u32::from(score), elapsed_seconds, rewards, tasks_completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskKind;
    use proptest::prelude::*;

    fn stats_from(outcomes: &[bool]) -> QuizStats {
        let mut stats = QuizStats::new();
        for correct in outcomes {
            stats.record(*correct);
        }
        stats
    }

    #[test]
    fn perfect_fast_run_caps_at_hundred() {
        let settings = LessonSettings::default();
        let stats = stats_from(&[true]);
        assert_eq!(aggregate_score(&stats, 120, &settings), 100);
    }

    #[test]
    fn single_wrong_answer_keeps_only_speed_bonus() {
        let settings = LessonSettings::default();
        let stats = stats_from(&[false]);
        assert_eq!(aggregate_score(&stats, 120, &settings), 10);
        assert_eq!(aggregate_score(&stats, 300, &settings), 0);
    }

    #[test]
    fn mixed_run_rounds() {
        let settings = LessonSettings::default();
        // 2/3 correct = 66.67, streak 1 => +5, slow => no speed bonus
        let stats = stats_from(&[true, false, true]);
        assert_eq!(aggregate_score(&stats, 900, &settings), 72);
    }

    #[test]
    fn no_questions_scores_full_accuracy() {
        let settings = LessonSettings::default();
        assert_eq!(aggregate_score(&QuizStats::new(), 1_000, &settings), 100);
    }

    #[test]
    fn rewards_use_defaults_for_missing_values() {
        let settings = LessonSettings::default();
        let tasks = vec![
            Task::new("a", TaskKind::Quiz).with_rewards(20, 5),
            Task::new("b", TaskKind::Flashcard),
        ];
        assert_eq!(
            aggregate_rewards(&tasks, &settings),
            Rewards { xp: 30, gems: 7 }
        );
        assert_eq!(aggregate_rewards(&[], &settings), Rewards::default());
    }

    #[test]
    fn summarize_packages_values() {
        let result = summarize(100, 120, Rewards { xp: 20, gems: 5 }, 1).unwrap();
        assert_eq!(result.score(), 100);
        assert_eq!(result.total_xp(), 20);
        assert_eq!(result.total_gems(), 5);
        assert_eq!(result.tasks_completed(), 1);
        assert!(summarize(101, 0, Rewards::default(), 0).is_err());
    }

    proptest! {
        #[test]
        fn score_is_always_in_range(
            outcomes in prop::collection::vec(any::<bool>(), 0..200),
            elapsed in any::<u64>(),
        ) {
            let stats = stats_from(&outcomes);
            let score = aggregate_score(&stats, elapsed, &LessonSettings::default());
            prop_assert!(score <= 100);
        }
    }
}
