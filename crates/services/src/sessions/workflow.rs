use std::sync::Arc;

use lesson_core::model::{Lesson, LessonId, SessionId, Step};
use lesson_core::{LessonSession, StepCompiler};
use storage::repository::{
    LessonRepository, LessonSummary, RewardPersistence, Storage, StorageError,
};
use tracing::{info, warn};

use crate::Clock;
use crate::error::SessionError;
use super::host::LessonHost;
use super::service::LessonLoop;

/// Orchestrates lesson lookup, compilation and session start.
#[derive(Clone)]
pub struct LessonLoopService {
    clock: Clock,
    compiler: StepCompiler,
    lessons: Arc<dyn LessonRepository>,
    rewards: Arc<dyn RewardPersistence>,
}

impl LessonLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        lessons: Arc<dyn LessonRepository>,
        rewards: Arc<dyn RewardPersistence>,
    ) -> Self {
        Self {
            clock,
            compiler: StepCompiler::default(),
            lessons,
            rewards,
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.rewards),
        )
    }

    #[must_use]
    pub fn with_compiler(mut self, compiler: StepCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    #[must_use]
    pub fn compiler(&self) -> &StepCompiler {
        &self.compiler
    }

    /// Start a session for a stored lesson.
    ///
    /// A lesson that cannot be found starts a session on the diagnostic step
    /// instead of failing.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` for storage failures other than a
    /// missing lesson.
    pub async fn start_session<H: LessonHost>(
        &self,
        lesson_id: &LessonId,
        host: H,
    ) -> Result<LessonLoop<H>, SessionError> {
        let lesson = self.find_lesson(lesson_id).await?;
        Ok(self.start_with(lesson.as_ref(), host))
    }

    /// Start a session for an in-memory lesson definition.
    pub fn start_with<H: LessonHost>(&self, lesson: Option<&Lesson>, host: H) -> LessonLoop<H> {
        let session_id = SessionId::random();
        let (session, events) =
            LessonSession::start(session_id, lesson, &self.compiler, self.clock.now());
        info!(
            session_id = %session_id,
            lesson_id = ?session.lesson_id(),
            steps = session.steps().len(),
            "starting lesson"
        );
        LessonLoop::new(session, events, host, self.clock, Arc::clone(&self.rewards))
    }

    /// Compiled steps of a stored lesson, without starting a session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` for storage failures other than a
    /// missing lesson.
    pub async fn outline(&self, lesson_id: &LessonId) -> Result<Vec<Step>, SessionError> {
        let lesson = self.find_lesson(lesson_id).await?;
        Ok(self.compiler.compile_optional(lesson.as_ref()))
    }

    /// List the lessons available to start.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the repository cannot be read.
    pub async fn list_lessons(&self) -> Result<Vec<LessonSummary>, SessionError> {
        Ok(self.lessons.list_lessons().await?)
    }

    async fn find_lesson(&self, lesson_id: &LessonId) -> Result<Option<Lesson>, SessionError> {
        match self.lessons.get_lesson(lesson_id).await {
            Ok(lesson) => Ok(Some(lesson)),
            Err(StorageError::NotFound) => {
                warn!(lesson_id = %lesson_id, "lesson not found");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}
