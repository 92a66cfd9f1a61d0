#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;

pub use lesson_core::Clock;
pub use sessions as session;

pub use error::SessionError;

pub use sessions::{LessonHost, LessonLoop, LessonLoopService};
