//! Lesson definitions loaded from a JSON table.
//!
//! The table has the shape `{"lessons": [ ... ]}`; every entry is a
//! [`Lesson`] and must carry a unique `id`. An entry that does not parse as a
//! lesson is logged and left out; the rest of the table still loads.

use async_trait::async_trait;
use lesson_core::model::{Lesson, LessonId};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::repository::{LessonRepository, LessonSummary, StorageError};

const BUNDLED_LESSONS: &str = include_str!("../data/lessons.json");

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("failed to read lesson table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("lesson table is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("lesson #{index} has no id")]
    MissingId { index: usize },

    #[error("duplicate lesson id: {0}")]
    DuplicateId(LessonId),
}

#[derive(Debug, Deserialize)]
struct LessonTable {
    #[serde(default)]
    lessons: Vec<serde_json::Value>,
}

/// Read-only lesson table keyed by id, in authored order.
#[derive(Debug, Clone, Default)]
pub struct LessonCatalog {
    lessons: Vec<Lesson>,
    index: HashMap<LessonId, usize>,
}

impl LessonCatalog {
    /// Build a catalog from already parsed lessons.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::MissingId` or `CatalogError::DuplicateId`.
    pub fn from_lessons(lessons: Vec<Lesson>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(lessons.len());
        for (position, lesson) in lessons.iter().enumerate() {
            let id = lesson
                .id
                .clone()
                .ok_or(CatalogError::MissingId { index: position })?;
            if index.insert(id.clone(), position).is_some() {
                return Err(CatalogError::DuplicateId(id));
            }
        }
        Ok(Self { lessons, index })
    }

    /// Parse a JSON lesson table.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for malformed JSON or invalid ids.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let table: LessonTable = serde_json::from_str(json)?;
        let lessons = table
            .lessons
            .into_iter()
            .enumerate()
            .filter_map(|(position, entry)| {
                let id = entry.get("id").and_then(|id| id.as_str()).map(str::to_owned);
                match serde_json::from_value::<Lesson>(entry) {
                    Ok(lesson) => Some(lesson),
                    Err(err) => {
                        warn!(index = position, lesson_id = ?id, error = %err, "skipping unreadable lesson");
                        None
                    }
                }
            })
            .collect();
        Self::from_lessons(lessons)
    }

    /// Load a JSON lesson table from disk.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Io` if the file cannot be read, otherwise as
    /// [`LessonCatalog::from_json`].
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&json)?;
        debug!(path = %path.display(), lessons = catalog.len(), "loaded lesson table");
        Ok(catalog)
    }

    /// Sample lessons shipped with the crate.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the bundled table is invalid.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_LESSONS)
    }

    #[must_use]
    pub fn get(&self, id: &LessonId) -> Option<&Lesson> {
        self.index.get(id).map(|&position| &self.lessons[position])
    }

    /// Ids in authored order.
    pub fn ids(&self) -> impl Iterator<Item = &LessonId> {
        self.lessons.iter().filter_map(|l| l.id.as_ref())
    }

    #[must_use]
    pub fn summaries(&self) -> Vec<LessonSummary> {
        self.lessons
            .iter()
            .filter_map(|l| {
                l.id.clone()
                    .map(|id| LessonSummary::from_lesson(id, l))
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }
}

#[async_trait]
impl LessonRepository for LessonCatalog {
    async fn get_lesson(&self, id: &LessonId) -> Result<Lesson, StorageError> {
        self.get(id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_lessons(&self) -> Result<Vec<LessonSummary>, StorageError> {
        Ok(self.summaries())
    }
}
