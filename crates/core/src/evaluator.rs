use std::collections::BTreeSet;

use crate::model::{AnswerKey, QuizPayload};

/// Decide whether `selection` answers `quiz` correctly.
///
/// Selection order and duplicates are irrelevant. A single-answer quiz is
/// correct only when the selection is exactly its key; a multi-answer quiz
/// needs the exact set, with no omissions and no extras.
#[must_use]
pub fn evaluate(quiz: &QuizPayload, selection: &[usize]) -> bool {
    let chosen: BTreeSet<usize> = selection.iter().copied().collect();
    match &quiz.answer {
        AnswerKey::Single(index) => chosen.len() == 1 && chosen.contains(index),
        AnswerKey::Multi(expected) => chosen == *expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuizOrigin, TaskId};

    fn quiz(answer: AnswerKey, options: usize) -> QuizPayload {
        QuizPayload {
            task_id: TaskId::new("t"),
            options: (0..options).map(|i| format!("option {i}")).collect(),
            answer,
            explanation: None,
            hint: None,
            reward_xp: 10,
            origin: QuizOrigin::Task,
        }
    }

    #[test]
    fn single_answer_requires_exact_choice() {
        let q = quiz(AnswerKey::Single(1), 4);
        assert!(evaluate(&q, &[1]));
        assert!(!evaluate(&q, &[0]));
        assert!(!evaluate(&q, &[1, 2]));
    }

    #[test]
    fn multi_answer_ignores_order() {
        let q = quiz(AnswerKey::Multi([0, 2].into_iter().collect()), 4);
        assert!(evaluate(&q, &[2, 0]));
        assert!(!evaluate(&q, &[0]));
        assert!(!evaluate(&q, &[0, 1, 2]));
    }

    #[test]
    fn duplicate_indices_collapse() {
        let q = quiz(AnswerKey::Single(3), 4);
        assert!(evaluate(&q, &[3, 3]));
    }

    #[test]
    fn empty_selection_is_never_correct() {
        assert!(!evaluate(&quiz(AnswerKey::Single(0), 2), &[]));
        assert!(!evaluate(&quiz(AnswerKey::Multi(BTreeSet::new()), 2), &[1]));
    }
}
