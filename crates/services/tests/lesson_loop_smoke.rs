use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use lesson_core::model::{
    CompletionResult, FinalAssessmentPayload, LessonId, SessionId, Step, StepId, StepKind, TaskId,
};
use lesson_core::time::fixed_now;
use lesson_core::{AnswerRecord, Cue, DIAGNOSTIC_STEP_ID};
use services::{Clock, LessonHost, LessonLoop, LessonLoopService};
use storage::repository::{RewardPersistence, RewardRecord, StorageError};
use storage::{InMemoryRepository, LessonCatalog};

#[derive(Debug, Default)]
struct RecordingHost {
    total_steps: Option<usize>,
    entered: Vec<StepId>,
    hearts_lost: Vec<u32>,
    rewards: Vec<(TaskId, u32)>,
    cues: Vec<Cue>,
    ready: Vec<(StepId, usize, usize)>,
    assessment_results: Vec<(bool, u8)>,
    completed: Vec<CompletionResult>,
    exits: usize,
}

impl LessonHost for RecordingHost {
    fn on_session_started(&mut self, total_steps: usize) {
        self.total_steps = Some(total_steps);
    }

    fn on_step_entered(&mut self, _index: usize, step: &Step) {
        self.entered.push(step.id.clone());
    }

    fn on_heart_lost(&mut self, hearts_remaining: u32) {
        self.hearts_lost.push(hearts_remaining);
    }

    fn on_reward_earned(&mut self, task_id: &TaskId, xp: u32) {
        self.rewards.push((task_id.clone(), xp));
    }

    fn on_cue(&mut self, cue: Cue) {
        self.cues.push(cue);
    }

    fn on_final_assessment_ready(
        &mut self,
        step_id: &StepId,
        gate: &FinalAssessmentPayload,
        answers: &[AnswerRecord],
    ) {
        self.ready
            .push((step_id.clone(), gate.questions.len(), answers.len()));
    }

    fn on_final_assessment_result(&mut self, passed: bool, score: u8) {
        self.assessment_results.push((passed, score));
    }

    fn on_complete(&mut self, result: &CompletionResult) {
        self.completed.push(*result);
    }

    fn on_exit(&mut self) {
        self.exits += 1;
    }
}

struct FailingRewards;

#[async_trait]
impl RewardPersistence for FailingRewards {
    async fn record_reward(&self, _record: &RewardRecord) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn rewards_for_session(
        &self,
        _session_id: SessionId,
    ) -> Result<Vec<RewardRecord>, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }
}

fn service(rewards: Arc<dyn RewardPersistence>) -> LessonLoopService {
    let catalog = LessonCatalog::bundled().unwrap();
    LessonLoopService::new(Clock::fixed(fixed_now()), Arc::new(catalog), rewards)
}

/// Answer the current step correctly if it is a quiz, then advance.
fn play_step(lesson_loop: &mut LessonLoop<RecordingHost>) {
    let step = lesson_loop.current_step().clone();
    match step.kind() {
        StepKind::Quiz => {
            let quiz = step.quiz().unwrap();
            match &quiz.answer {
                lesson_core::model::AnswerKey::Single(i) => {
                    lesson_loop.toggle_selection(*i);
                }
                lesson_core::model::AnswerKey::Multi(set) => {
                    for i in set {
                        lesson_loop.toggle_selection(*i);
                    }
                }
            }
            lesson_loop.submit();
        }
        StepKind::FinalAssessment => {
            lesson_loop.report_final_assessment(90, true);
        }
        _ => {}
    }
    lesson_loop.clock_mut().advance(Duration::seconds(1));
    lesson_loop.advance();
}

/// Answer every quiz with its correct option and advance through the rest.
fn play_correctly(lesson_loop: &mut LessonLoop<RecordingHost>) {
    for _ in 0..200 {
        if lesson_loop.is_complete() {
            return;
        }
        play_step(lesson_loop);
    }
    panic!("lesson did not complete");
}

#[tokio::test]
async fn bundled_lesson_completes_and_persists_rewards() {
    let repo = InMemoryRepository::new();
    let svc = service(Arc::new(repo.clone()));

    let mut lesson_loop = svc
        .start_session(&LessonId::new("lesson-1-1"), RecordingHost::default())
        .await
        .unwrap();
    play_correctly(&mut lesson_loop);
    lesson_loop.flush_rewards().await;

    let host = lesson_loop.host();
    assert_eq!(host.total_steps, Some(lesson_loop.session().steps().len()));
    assert_eq!(host.completed.len(), 1);
    let result = host.completed[0];
    assert_eq!(result.score(), 100);
    assert_eq!(result.total_xp(), 40);
    assert_eq!(result.total_gems(), 9);
    assert_eq!(result.tasks_completed(), 3);
    assert!(host.hearts_lost.is_empty());
    assert_eq!(host.rewards.len(), 3);
    assert_eq!(host.entered.first().map(StepId::as_str), Some("intro"));
    assert_eq!(host.entered.last().map(StepId::as_str), Some("summary"));
    assert!(host.cues.contains(&Cue::Correct));

    let stored = repo
        .rewards_for_session(lesson_loop.session_id())
        .await
        .unwrap();
    let xp: u32 = stored.iter().map(|r| r.xp).sum();
    assert_eq!(stored.len(), 3);
    assert_eq!(xp, 20 + 20 + 10);
    assert!(stored
        .iter()
        .all(|r| r.lesson_id == Some(LessonId::new("lesson-1-1"))));
}

#[tokio::test]
async fn assessment_gate_uses_reported_score() {
    let svc = service(Arc::new(InMemoryRepository::new()));
    let mut lesson_loop = svc
        .start_session(&LessonId::new("lesson-4-7"), RecordingHost::default())
        .await
        .unwrap();
    play_correctly(&mut lesson_loop);

    let host = lesson_loop.host();
    assert_eq!(host.ready.len(), 1);
    let (gate_id, questions, answers) = &host.ready[0];
    assert_eq!(gate_id.as_str(), "av-block-final-assessment");
    assert_eq!(*questions, 3);
    assert_eq!(*answers, 3);
    assert_eq!(host.assessment_results, vec![(true, 90)]);
    assert_eq!(host.completed[0].score(), 90);
}

#[tokio::test]
async fn failed_persistence_does_not_block_progress() {
    let svc = service(Arc::new(FailingRewards));
    let mut lesson_loop = svc
        .start_session(&LessonId::new("lesson-1-1"), RecordingHost::default())
        .await
        .unwrap();
    play_correctly(&mut lesson_loop);
    lesson_loop.flush_rewards().await;

    assert!(lesson_loop.is_complete());
    assert_eq!(lesson_loop.host().rewards.len(), 3);
    assert_eq!(lesson_loop.result().unwrap().score(), 100);
}

#[tokio::test]
async fn finished_reward_writes_are_pruned() {
    let repo = InMemoryRepository::new();
    let svc = service(Arc::new(repo.clone()));
    let mut lesson_loop = svc
        .start_session(&LessonId::new("lesson-1-1"), RecordingHost::default())
        .await
        .unwrap();

    let mut most_pending = 0;
    for _ in 0..200 {
        if lesson_loop.is_complete() {
            break;
        }
        play_step(&mut lesson_loop);
        most_pending = most_pending.max(lesson_loop.pending_rewards());
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    assert!(lesson_loop.is_complete());
    assert_eq!(most_pending, 1);
    lesson_loop.flush_rewards().await;
    assert_eq!(lesson_loop.pending_rewards(), 0);
    let stored = repo
        .rewards_for_session(lesson_loop.session_id())
        .await
        .unwrap();
    assert_eq!(stored.len(), 3);
}

#[tokio::test]
async fn wrong_answer_costs_a_heart() {
    let svc = service(Arc::new(InMemoryRepository::new()));
    let mut lesson_loop = svc
        .start_session(&LessonId::new("lesson-1-1"), RecordingHost::default())
        .await
        .unwrap();
    while lesson_loop.current_step().kind() != StepKind::Quiz {
        lesson_loop.advance();
    }

    lesson_loop.toggle_selection(0);
    lesson_loop.submit();

    assert_eq!(lesson_loop.host().hearts_lost, vec![4]);
    assert!(lesson_loop.host().cues.contains(&Cue::HeartLost));
    assert!(lesson_loop.host().rewards.is_empty());
    assert_eq!(lesson_loop.progress().hearts_remaining, 4);
}

#[tokio::test]
async fn unknown_lesson_starts_on_diagnostic_step() {
    let svc = service(Arc::new(InMemoryRepository::new()));
    let mut lesson_loop = svc
        .start_session(&LessonId::new("no-such-lesson"), RecordingHost::default())
        .await
        .unwrap();

    assert_eq!(lesson_loop.current_step().id.as_str(), DIAGNOSTIC_STEP_ID);
    assert!(!lesson_loop.is_complete());
    lesson_loop.advance();
    assert_eq!(lesson_loop.host().completed.len(), 1);
}

#[tokio::test]
async fn exit_notifies_host() {
    let svc = service(Arc::new(InMemoryRepository::new()));
    let mut lesson_loop = svc
        .start_session(&LessonId::new("lesson-1-1"), RecordingHost::default())
        .await
        .unwrap();
    lesson_loop.advance();
    let host = lesson_loop.exit();
    assert_eq!(host.exits, 1);
    assert!(host.completed.is_empty());
}

#[tokio::test]
async fn lists_and_outlines_lessons() {
    let svc = service(Arc::new(InMemoryRepository::new()));
    let lessons = svc.list_lessons().await.unwrap();
    assert_eq!(lessons.len(), 2);

    let outline = svc.outline(&LessonId::new("lesson-4-7")).await.unwrap();
    assert_eq!(outline.first().map(Step::kind), Some(StepKind::Introduction));
    assert!(outline.iter().any(|s| s.kind() == StepKind::Video));
    assert!(outline.iter().any(|s| s.kind() == StepKind::CaseStudy));
}
