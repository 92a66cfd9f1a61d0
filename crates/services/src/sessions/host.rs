use lesson_core::model::{CompletionResult, FinalAssessmentPayload, Step, StepId, TaskId};
use lesson_core::{AnswerRecord, Cue};

/// Callbacks a presentation layer implements to follow a lesson session.
///
/// All callbacks run synchronously, after the transition that caused them
/// has been applied. Only the final-assessment and completion hooks have to
/// be implemented; the rest default to doing nothing.
pub trait LessonHost {
    /// Fires once, before the first step is entered.
    fn on_session_started(&mut self, _total_steps: usize) {}

    fn on_step_entered(&mut self, _index: usize, _step: &Step) {}

    fn on_answer_evaluated(&mut self, _step_id: &StepId, _correct: bool) {}

    /// Fires once per incorrect submission.
    fn on_heart_lost(&mut self, _hearts_remaining: u32) {}

    /// Fires at most once per correctly answered quiz step.
    fn on_reward_earned(&mut self, _task_id: &TaskId, _xp: u32) {}

    fn on_cue(&mut self, _cue: Cue) {}

    /// The learner reached an assessment gate.
    ///
    /// The host grades `answers` and reports back through
    /// [`crate::LessonLoop::report_final_assessment`].
    fn on_final_assessment_ready(
        &mut self,
        step_id: &StepId,
        gate: &FinalAssessmentPayload,
        answers: &[AnswerRecord],
    );

    fn on_final_assessment_result(&mut self, _passed: bool, _score: u8) {}

    /// Fires exactly once, when the session completes.
    fn on_complete(&mut self, result: &CompletionResult);

    fn on_exit(&mut self) {}
}
