//! Storage traits and error types

use crate::state::RunSnapshot;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Corrupt run state: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable home of a crawl's resumable state
///
/// A store holds at most one snapshot; saving replaces it wholesale.
pub trait StateStore: Send {
    /// Loads the persisted snapshot, if any
    fn load(&self) -> StorageResult<Option<RunSnapshot>>;

    /// Replaces the persisted snapshot
    fn save(&mut self, snapshot: &RunSnapshot) -> StorageResult<()>;

    /// Removes any persisted snapshot
    fn clear(&mut self) -> StorageResult<()>;
}
