mod completion;
mod ids;
pub mod lesson;
mod settings;
mod stats;
mod step;

pub use completion::{CompletionError, CompletionResult, Rewards};
pub use ids::{LessonId, ParseIdError, SessionId, StepId, TaskId};
pub use lesson::{
    AssessmentQuestion, AudioQuestion, Lesson, LessonContent, Narration, PatientInfo,
    PreparatoryVideo, RawAnswer, Slide, SlideBody, Task, TaskAudio, TaskContent, TaskImages,
    TaskKind,
};
pub use settings::{LessonSettings, LessonSettingsDraft, SettingsError};
pub use stats::QuizStats;
pub use step::{
    AnswerKey, FinalAssessmentPayload, Media, QuizOrigin, QuizPayload, Step, StepKind,
    StepPayload, VideoDescriptor,
};
