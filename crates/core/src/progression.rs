//! Progression state machine for one lesson session.
//!
//! [`LessonSession`] is a synchronous reducer. Every [`Transition`] either
//! applies completely and returns the [`SessionEvent`]s it produced, or is
//! rejected as a silent no-op with no events and no state change. Side
//! effects (sounds, persistence, host callbacks) are left to whoever consumes
//! the events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, trace, warn};

use crate::compiler::StepCompiler;
use crate::evaluator::evaluate;
use crate::model::{
    CompletionResult, Lesson, LessonId, LessonSettings, QuizStats, Rewards, SessionId,
    Step, StepId, StepKind, TaskId,
};
use crate::scoring::{aggregate_rewards, aggregate_score, summarize};
use crate::time::{elapsed_millis, elapsed_seconds};

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

/// Presentation cue for sounds and animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cue {
    Correct,
    /// Correct answer within the perfect-answer window.
    Perfect,
    /// Streak reached the celebration threshold.
    Streak,
    HeartLost,
}

/// One submission, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub step_id: StepId,
    pub selection: Vec<usize>,
    pub correct: bool,
    pub time_on_step_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StepEntered {
        index: usize,
        step_id: StepId,
    },
    AnswerEvaluated {
        step_id: StepId,
        correct: bool,
    },
    HeartLost {
        hearts_remaining: u32,
    },
    RewardEarned {
        task_id: TaskId,
        xp: u32,
    },
    Cue(Cue),
    /// The learner reached an assessment gate; the host grades `answers`.
    FinalAssessmentReady {
        step_id: StepId,
        task_id: TaskId,
        answers: Vec<AnswerRecord>,
    },
    FinalAssessmentPassed {
        score: u8,
    },
    FinalAssessmentFailed {
        score: u8,
    },
    Completed(CompletionResult),
    Exited,
}

//
// ─── TRANSITIONS ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    ToggleSelection(usize),
    Submit,
    Advance,
    Retreat,
    /// Host-graded final assessment result. Scores above 100 are clamped.
    ReportFinalAssessment { score: u32, passed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Presenting,
    AnswerRevealed { correct: bool },
    Completed(CompletionResult),
}

/// Snapshot for hosts rendering a progress bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LessonProgress {
    pub total_steps: usize,
    pub current_index: usize,
    pub hearts_remaining: u32,
    pub stats: QuizStats,
    pub percent_complete: u8,
    pub is_complete: bool,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
pub struct LessonSession {
    id: SessionId,
    lesson_id: Option<LessonId>,
    version: u64,
    steps: Vec<Step>,
    current_index: usize,
    hearts: u32,
    selection: BTreeSet<usize>,
    phase: Phase,
    stats: QuizStats,
    started_at: DateTime<Utc>,
    step_started_at: DateTime<Utc>,
    answers: Vec<AnswerRecord>,
    rewarded_steps: BTreeSet<StepId>,
    passed_gates: BTreeSet<StepId>,
    assessment_score: Option<u8>,
    rewards: Rewards,
    tasks_completed: u32,
    perfect_answers: u32,
    settings: LessonSettings,
}

impl LessonSession {
    /// Compile `lesson` and start a session on its first step.
    ///
    /// Returns the session and the events for entering the first step.
    #[must_use]
    pub fn start(
        id: SessionId,
        lesson: Option<&Lesson>,
        compiler: &StepCompiler,
        now: DateTime<Utc>,
    ) -> (Self, Vec<SessionEvent>) {
        let settings = compiler.settings().clone();
        let steps = compiler.compile_optional(lesson);
        let usable = lesson.filter(|l| l.display_title().is_some());
        let tasks = usable.map_or(&[][..], |l| l.tasks.as_slice());

        let session = Self {
            id,
            lesson_id: lesson.and_then(|l| l.id.clone()),
            version: 0,
            steps,
            current_index: 0,
            hearts: settings.starting_hearts(),
            selection: BTreeSet::new(),
            phase: Phase::Presenting,
            stats: QuizStats::new(),
            started_at: now,
            step_started_at: now,
            answers: Vec::new(),
            rewarded_steps: BTreeSet::new(),
            passed_gates: BTreeSet::new(),
            assessment_score: None,
            rewards: aggregate_rewards(tasks, &settings),
            tasks_completed: u32::try_from(tasks.len()).unwrap_or(u32::MAX),
            perfect_answers: 0,
            settings,
        };
        debug!(
            session_id = %session.id,
            lesson_id = ?session.lesson_id,
            steps = session.steps.len(),
            "lesson session started"
        );
        let events = session.entry_events();
        (session, events)
    }

    /// Apply one transition. Rejected transitions return no events.
    pub fn apply(&mut self, transition: Transition, now: DateTime<Utc>) -> Vec<SessionEvent> {
        if matches!(self.phase, Phase::Completed(_)) {
            trace!(?transition, "session completed; ignoring transition");
            return Vec::new();
        }

        let outcome = match &transition {
            Transition::ToggleSelection(index) => self.on_toggle(*index),
            Transition::Submit => self.on_submit(now),
            Transition::Advance => self.on_advance(now),
            Transition::Retreat => self.on_retreat(now),
            Transition::ReportFinalAssessment { score, passed } => {
                self.on_report(*score, *passed)
            }
        };

        match outcome {
            Some(events) => {
                self.version += 1;
                events
            }
            None => {
                trace!(?transition, index = self.current_index, "transition not valid here");
                Vec::new()
            }
        }
    }

    pub fn toggle_selection(&mut self, index: usize, now: DateTime<Utc>) -> Vec<SessionEvent> {
        self.apply(Transition::ToggleSelection(index), now)
    }

    pub fn submit(&mut self, now: DateTime<Utc>) -> Vec<SessionEvent> {
        self.apply(Transition::Submit, now)
    }

    pub fn advance(&mut self, now: DateTime<Utc>) -> Vec<SessionEvent> {
        self.apply(Transition::Advance, now)
    }

    pub fn retreat(&mut self, now: DateTime<Utc>) -> Vec<SessionEvent> {
        self.apply(Transition::Retreat, now)
    }

    pub fn report_final_assessment(
        &mut self,
        score: u32,
        passed: bool,
        now: DateTime<Utc>,
    ) -> Vec<SessionEvent> {
        self.apply(Transition::ReportFinalAssessment { score, passed }, now)
    }

    /// Abandon the session.
    #[must_use]
    pub fn exit(self) -> Vec<SessionEvent> {
        debug!(session_id = %self.id, index = self.current_index, "lesson session abandoned");
        vec![SessionEvent::Exited]
    }

    //
    // ─── HANDLERS ─────────────────────────────────────────────────────────────
    //

    fn on_toggle(&mut self, index: usize) -> Option<Vec<SessionEvent>> {
        if self.phase != Phase::Presenting {
            return None;
        }
        let quiz = self.current_step().quiz()?;
        if index >= quiz.options.len() {
            return None;
        }
        if quiz.answer.is_multi() {
            if !self.selection.remove(&index) {
                self.selection.insert(index);
            }
        } else {
            self.selection.clear();
            self.selection.insert(index);
        }
        Some(Vec::new())
    }

    fn on_submit(&mut self, now: DateTime<Utc>) -> Option<Vec<SessionEvent>> {
        if self.phase != Phase::Presenting || self.selection.is_empty() {
            return None;
        }
        let step = &self.steps[self.current_index];
        let quiz = step.quiz()?;
        let step_id = step.id.clone();
        let task_id = quiz.task_id.clone();
        let reward_xp = quiz.reward_xp;

        let selection: Vec<usize> = self.selection.iter().copied().collect();
        let correct = evaluate(quiz, &selection);
        let time_on_step_ms = elapsed_millis(self.step_started_at, now);

        self.stats.record(correct);
        self.answers.push(AnswerRecord {
            step_id: step_id.clone(),
            selection,
            correct,
            time_on_step_ms,
        });
        self.phase = Phase::AnswerRevealed { correct };

        let mut events = vec![SessionEvent::AnswerEvaluated {
            step_id: step_id.clone(),
            correct,
        }];
        if correct {
            events.push(SessionEvent::Cue(Cue::Correct));
            if time_on_step_ms <= self.settings.perfect_answer_window_ms() {
                self.perfect_answers += 1;
                events.push(SessionEvent::Cue(Cue::Perfect));
            }
            if self.stats.streak() >= self.settings.celebrate_streak_at() {
                events.push(SessionEvent::Cue(Cue::Streak));
            }
            if self.rewarded_steps.insert(step_id) {
                events.push(SessionEvent::RewardEarned {
                    task_id,
                    xp: reward_xp,
                });
            }
        } else {
            self.hearts = self.hearts.saturating_sub(1);
            events.push(SessionEvent::HeartLost {
                hearts_remaining: self.hearts,
            });
            events.push(SessionEvent::Cue(Cue::HeartLost));
        }
        Some(events)
    }

    fn on_advance(&mut self, now: DateTime<Utc>) -> Option<Vec<SessionEvent>> {
        let step = self.current_step();
        if self.phase == Phase::Presenting {
            if step.kind().is_interactive() && !self.has_answered(&step.id) {
                return None;
            }
            if step.kind() == StepKind::FinalAssessment && !self.passed_gates.contains(&step.id) {
                return None;
            }
        }

        if self.current_index + 1 >= self.steps.len() {
            return self.complete(now);
        }

        self.current_index += 1;
        self.reset_step(now);
        Some(self.entry_events())
    }

    fn on_retreat(&mut self, now: DateTime<Utc>) -> Option<Vec<SessionEvent>> {
        if self.current_index == 0 {
            return None;
        }
        self.current_index -= 1;
        self.reset_step(now);
        Some(self.entry_events())
    }

    fn on_report(&mut self, score: u32, passed: bool) -> Option<Vec<SessionEvent>> {
        let step_id = {
            let step = self.current_step();
            step.final_assessment()?;
            step.id.clone()
        };
        let score = u8::try_from(score.min(100)).unwrap_or(100);
        if passed {
            debug!(step_id = %step_id, score, "final assessment passed");
            self.passed_gates.insert(step_id);
            self.assessment_score = Some(score);
            Some(vec![SessionEvent::FinalAssessmentPassed { score }])
        } else {
            debug!(step_id = %step_id, score, "final assessment failed");
            Some(vec![SessionEvent::FinalAssessmentFailed { score }])
        }
    }

    fn complete(&mut self, now: DateTime<Utc>) -> Option<Vec<SessionEvent>> {
        let elapsed = elapsed_seconds(self.started_at, now);
        let score = self
            .assessment_score
            .unwrap_or_else(|| aggregate_score(&self.stats, elapsed, &self.settings));
        let result = match summarize(score, elapsed, self.rewards, self.tasks_completed) {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "could not summarize lesson session");
                return None;
            }
        };
        self.selection.clear();
        self.phase = Phase::Completed(result);
        debug!(
            session_id = %self.id,
            score = result.score(),
            elapsed_secs = elapsed,
            "lesson session completed"
        );
        Some(vec![SessionEvent::Completed(result)])
    }

    fn reset_step(&mut self, now: DateTime<Utc>) {
        self.selection.clear();
        self.phase = Phase::Presenting;
        self.step_started_at = now;
    }

    fn entry_events(&self) -> Vec<SessionEvent> {
        let step = self.current_step();
        let mut events = vec![SessionEvent::StepEntered {
            index: self.current_index,
            step_id: step.id.clone(),
        }];
        if let Some(gate) = step.final_assessment() {
            let answers = gate
                .question_steps
                .iter()
                .filter_map(|id| self.latest_answer(id).cloned())
                .collect();
            events.push(SessionEvent::FinalAssessmentReady {
                step_id: step.id.clone(),
                task_id: gate.task_id.clone(),
                answers,
            });
        }
        events
    }

    fn has_answered(&self, step_id: &StepId) -> bool {
        self.answers.iter().any(|a| &a.step_id == step_id)
    }

    fn latest_answer(&self, step_id: &StepId) -> Option<&AnswerRecord> {
        self.answers.iter().rev().find(|a| &a.step_id == step_id)
    }

    //
    // ─── ACCESSORS ────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn lesson_id(&self) -> Option<&LessonId> {
        self.lesson_id.as_ref()
    }

    /// Bumped by every accepted transition.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_step(&self) -> &Step {
        &self.steps[self.current_index]
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn selection(&self) -> &BTreeSet<usize> {
        &self.selection
    }

    #[must_use]
    pub fn hearts_remaining(&self) -> u32 {
        self.hearts
    }

    #[must_use]
    pub fn stats(&self) -> &QuizStats {
        &self.stats
    }

    #[must_use]
    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    #[must_use]
    pub fn perfect_answers(&self) -> u32 {
        self.perfect_answers
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn result(&self) -> Option<&CompletionResult> {
        match &self.phase {
            Phase::Completed(result) => Some(result),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.phase, Phase::Completed(_))
    }

    #[must_use]
    pub fn progress(&self) -> LessonProgress {
        let total = self.steps.len();
        let is_complete = self.is_complete();
        let percent = if is_complete {
            100
        } else {
            (self.current_index * 100) / total.max(1)
        };
        LessonProgress {
            total_steps: total,
            current_index: self.current_index,
            hearts_remaining: self.hearts,
            stats: self.stats,
            percent_complete: u8::try_from(percent).unwrap_or(100),
            is_complete,
        }
    }
}
