#![forbid(unsafe_code)]

pub mod compiler;
pub mod evaluator;
pub mod model;
pub mod progression;
pub mod scoring;
pub mod time;

pub use compiler::{DIAGNOSTIC_STEP_ID, StepCompiler, compile};
pub use evaluator::evaluate;
pub use progression::{
    AnswerRecord, Cue, LessonProgress, LessonSession, Phase, SessionEvent, Transition,
};
pub use scoring::{aggregate_rewards, aggregate_score, summarize};
pub use time::Clock;
