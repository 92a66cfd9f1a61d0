mod host;
mod service;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use host::LessonHost;
pub use service::LessonLoop;
pub use workflow::LessonLoopService;
