//! Filesystem persistence.
//!
//! JSONL files under the data directory are the source of truth; each line
//! is one entity. The [`MatchStore`] keeps an in-memory view and writes
//! through on every mutation.

mod directory_impl;
mod jsonl;
mod match_store;

pub use directory_impl::JsonlDirectory;
pub use jsonl::{EntityType, JsonlReader, JsonlWriter};
pub use match_store::MatchStore;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Path of the JSONL file backing one entity type.
    pub fn entity_path(&self, entity: EntityType) -> PathBuf {
        self.data_dir.join(entity.filename())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}
