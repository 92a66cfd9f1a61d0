use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_core::model::{Lesson, LessonId, SessionId, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// One XP award for a correctly answered quiz step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRecord {
    pub session_id: SessionId,
    pub lesson_id: Option<LessonId>,
    pub task_id: TaskId,
    pub xp: u32,
    pub earned_at: DateTime<Utc>,
}

/// Listing entry for a stored lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonSummary {
    pub id: LessonId,
    pub title: String,
    pub task_count: usize,
}

impl LessonSummary {
    #[must_use]
    pub fn from_lesson(id: LessonId, lesson: &Lesson) -> Self {
        Self {
            id,
            title: lesson.display_title().unwrap_or("(untitled)").to_owned(),
            task_count: lesson.tasks.len(),
        }
    }
}

/// Read access to lesson definitions.
#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// Fetch a lesson by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_lesson(&self, id: &LessonId) -> Result<Lesson, StorageError>;

    /// List stored lessons in a stable order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_lessons(&self) -> Result<Vec<LessonSummary>, StorageError>;
}

/// Sink for per-answer XP awards.
#[async_trait]
pub trait RewardPersistence: Send + Sync {
    /// Persist a single reward.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the reward cannot be stored.
    async fn record_reward(&self, record: &RewardRecord) -> Result<(), StorageError>;

    /// Rewards recorded for one session, in the order they were stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn rewards_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<RewardRecord>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    lessons: Arc<Mutex<HashMap<LessonId, Lesson>>>,
    rewards: Arc<Mutex<Vec<RewardRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a lesson under its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the lesson has no id.
    pub fn upsert_lesson(&self, lesson: Lesson) -> Result<(), StorageError> {
        let id = lesson.id.clone().ok_or(StorageError::Conflict)?;
        let mut guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(id, lesson);
        Ok(())
    }
}

#[async_trait]
impl LessonRepository for InMemoryRepository {
    async fn get_lesson(&self, id: &LessonId) -> Result<Lesson, StorageError> {
        let guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_lessons(&self) -> Result<Vec<LessonSummary>, StorageError> {
        let guard = self
            .lessons
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut summaries: Vec<LessonSummary> = guard
            .iter()
            .map(|(id, lesson)| LessonSummary::from_lesson(id.clone(), lesson))
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }
}

#[async_trait]
impl RewardPersistence for InMemoryRepository {
    async fn record_reward(&self, record: &RewardRecord) -> Result<(), StorageError> {
        let mut guard = self
            .rewards
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.push(record.clone());
        Ok(())
    }

    async fn rewards_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<RewardRecord>, StorageError> {
        let guard = self
            .rewards
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }
}

/// Aggregates lesson and reward repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub lessons: Arc<dyn LessonRepository>,
    pub rewards: Arc<dyn RewardPersistence>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let lessons: Arc<dyn LessonRepository> = Arc::new(repo.clone());
        let rewards: Arc<dyn RewardPersistence> = Arc::new(repo);
        Self { lessons, rewards }
    }

    /// Serve lessons from `lessons`, rewards from a fresh in-memory store.
    #[must_use]
    pub fn with_lessons(lessons: Arc<dyn LessonRepository>) -> Self {
        let rewards: Arc<dyn RewardPersistence> = Arc::new(InMemoryRepository::new());
        Self { lessons, rewards }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{Task, TaskKind};
    use lesson_core::time::fixed_now;

    fn build_lesson(id: &str) -> Lesson {
        Lesson {
            id: Some(LessonId::new(id)),
            title: Some(format!("Lesson {id}")),
            tasks: vec![Task::new("t1", TaskKind::Quiz)],
            ..Lesson::default()
        }
    }

    #[tokio::test]
    async fn stores_and_lists_lessons() {
        let repo = InMemoryRepository::new();
        repo.upsert_lesson(build_lesson("b")).unwrap();
        repo.upsert_lesson(build_lesson("a")).unwrap();

        let fetched = repo.get_lesson(&LessonId::new("a")).await.unwrap();
        assert_eq!(fetched.display_title(), Some("Lesson a"));

        let listed = repo.list_lessons().await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(listed[0].task_count, 1);
    }

    #[tokio::test]
    async fn missing_lesson_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo.get_lesson(&LessonId::new("nope")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[test]
    fn lesson_without_id_is_rejected() {
        let repo = InMemoryRepository::new();
        let err = repo.upsert_lesson(Lesson::default()).unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn rewards_are_scoped_to_session() {
        let storage = Storage::in_memory();
        let mine = SessionId::random();
        let other = SessionId::random();
        for (session_id, xp) in [(mine, 10), (other, 5), (mine, 20)] {
            storage
                .rewards
                .record_reward(&RewardRecord {
                    session_id,
                    lesson_id: None,
                    task_id: TaskId::new("t"),
                    xp,
                    earned_at: fixed_now(),
                })
                .await
                .unwrap();
        }

        let recorded = storage.rewards.rewards_for_session(mine).await.unwrap();
        let xp: Vec<u32> = recorded.iter().map(|r| r.xp).collect();
        assert_eq!(xp, vec![10, 20]);
    }
}
