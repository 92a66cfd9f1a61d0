use std::sync::Arc;

use lesson_core::model::{CompletionResult, LessonId, SessionId, Step, TaskId};
use lesson_core::{Clock, LessonProgress, LessonSession, SessionEvent};
use storage::repository::{RewardPersistence, RewardRecord};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::host::LessonHost;

//
// ─── LOOP ──────────────────────────────────────────────────────────────────────
//

/// Drives one [`LessonSession`] on behalf of a [`LessonHost`].
///
/// Each call applies one transition, forwards the resulting events to the
/// host and returns them. Rewards are written to [`RewardPersistence`] on
/// the tokio runtime without being awaited; a failed write is logged and
/// never affects the session.
pub struct LessonLoop<H: LessonHost> {
    session: LessonSession,
    host: H,
    clock: Clock,
    rewards: Arc<dyn RewardPersistence>,
    pending_rewards: Vec<JoinHandle<()>>,
}

impl<H: LessonHost> LessonLoop<H> {
    /// Wrap a started session and replay its entry events to the host.
    pub fn new(
        session: LessonSession,
        entry_events: Vec<SessionEvent>,
        host: H,
        clock: Clock,
        rewards: Arc<dyn RewardPersistence>,
    ) -> Self {
        let mut lesson_loop = Self {
            session,
            host,
            clock,
            rewards,
            pending_rewards: Vec::new(),
        };
        let total_steps = lesson_loop.session.steps().len();
        lesson_loop.host.on_session_started(total_steps);
        lesson_loop.dispatch(&entry_events);
        lesson_loop
    }

    pub fn toggle_selection(&mut self, index: usize) -> Vec<SessionEvent> {
        let events = self.session.toggle_selection(index, self.clock.now());
        self.dispatch(&events);
        events
    }

    pub fn submit(&mut self) -> Vec<SessionEvent> {
        let events = self.session.submit(self.clock.now());
        self.dispatch(&events);
        events
    }

    pub fn advance(&mut self) -> Vec<SessionEvent> {
        let events = self.session.advance(self.clock.now());
        self.dispatch(&events);
        events
    }

    pub fn retreat(&mut self) -> Vec<SessionEvent> {
        let events = self.session.retreat(self.clock.now());
        self.dispatch(&events);
        events
    }

    /// Report the host-graded result of the assessment at the current step.
    ///
    /// Ignored unless the current step is an assessment gate.
    pub fn report_final_assessment(&mut self, score: u32, passed: bool) -> Vec<SessionEvent> {
        let events = self
            .session
            .report_final_assessment(score, passed, self.clock.now());
        self.dispatch(&events);
        events
    }

    /// Abandon the session and hand the host back.
    ///
    /// Reward writes already in flight keep running.
    pub fn exit(self) -> H {
        let Self {
            session, mut host, ..
        } = self;
        for event in session.exit() {
            if event == SessionEvent::Exited {
                host.on_exit();
            }
        }
        host
    }

    /// Reward writes spawned and not yet known to be finished.
    #[must_use]
    pub fn pending_rewards(&self) -> usize {
        self.pending_rewards.len()
    }

    /// Wait for every reward write started so far.
    pub async fn flush_rewards(&mut self) {
        for handle in self.pending_rewards.drain(..) {
            if let Err(err) = handle.await {
                warn!(error = %err, "reward persistence task did not finish");
            }
        }
    }

    #[must_use]
    pub fn progress(&self) -> LessonProgress {
        self.session.progress()
    }

    #[must_use]
    pub fn current_step(&self) -> &Step {
        self.session.current_step()
    }

    #[must_use]
    pub fn session(&self) -> &LessonSession {
        &self.session
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }

    #[must_use]
    pub fn result(&self) -> Option<&CompletionResult> {
        self.session.result()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.session.is_complete()
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Mutable access to the clock, e.g. to advance a fixed clock in tests.
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    //
    // ─── DISPATCH ─────────────────────────────────────────────────────────────
    //

    fn dispatch(&mut self, events: &[SessionEvent]) {
        for event in events {
            match event {
                SessionEvent::StepEntered { index, .. } => {
                    if let Some(step) = self.session.steps().get(*index) {
                        self.host.on_step_entered(*index, step);
                    }
                }
                SessionEvent::AnswerEvaluated { step_id, correct } => {
                    self.host.on_answer_evaluated(step_id, *correct);
                }
                SessionEvent::HeartLost { hearts_remaining } => {
                    self.host.on_heart_lost(*hearts_remaining);
                }
                SessionEvent::RewardEarned { task_id, xp } => {
                    self.host.on_reward_earned(task_id, *xp);
                    self.persist_reward(task_id.clone(), *xp);
                }
                SessionEvent::Cue(cue) => self.host.on_cue(*cue),
                SessionEvent::FinalAssessmentReady {
                    step_id, answers, ..
                } => {
                    if let Some(gate) = self.session.current_step().final_assessment() {
                        self.host.on_final_assessment_ready(step_id, gate, answers);
                    }
                }
                SessionEvent::FinalAssessmentPassed { score } => {
                    self.host.on_final_assessment_result(true, *score);
                }
                SessionEvent::FinalAssessmentFailed { score } => {
                    self.host.on_final_assessment_result(false, *score);
                }
                SessionEvent::Completed(result) => self.host.on_complete(result),
                SessionEvent::Exited => self.host.on_exit(),
            }
        }
    }

    fn persist_reward(&mut self, task_id: TaskId, xp: u32) {
        let record = RewardRecord {
            session_id: self.session.id(),
            lesson_id: self.session.lesson_id().cloned(),
            task_id,
            xp,
            earned_at: self.clock.now(),
        };
        let Ok(handle) = Handle::try_current() else {
            warn!(task_id = %record.task_id, "no async runtime; reward not persisted");
            return;
        };
        let rewards = Arc::clone(&self.rewards);
        self.pending_rewards.retain(|pending| !pending.is_finished());
        self.pending_rewards.push(handle.spawn(async move {
            match rewards.record_reward(&record).await {
                Ok(()) => debug!(task_id = %record.task_id, xp = record.xp, "reward persisted"),
                Err(err) => warn!(
                    error = %err,
                    session_id = %record.session_id,
                    lesson_id = ?record.lesson_id.as_ref().map(LessonId::as_str),
                    task_id = %record.task_id,
                    "failed to persist reward"
                ),
            }
        }));
    }
}
