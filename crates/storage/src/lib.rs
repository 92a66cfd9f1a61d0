#![forbid(unsafe_code)]

pub mod catalog;
pub mod repository;

pub use catalog::{CatalogError, LessonCatalog};
pub use repository::{
    InMemoryRepository, LessonRepository, LessonSummary, RewardPersistence, RewardRecord, Storage,
    StorageError,
};
