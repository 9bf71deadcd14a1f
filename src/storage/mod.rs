//! Storage module for persisting resumable crawl state
//!
//! A crawl run snapshots its parameters, its visited set and its remaining
//! frontier into a small SQLite file so an interrupted run can pick up where
//! it left off.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStateStore;
pub use traits::{StateStore, StorageError, StorageResult};

use std::path::Path;

/// Opens the state store at `path`, creating it if necessary
pub fn open_state_store(path: &Path) -> StorageResult<SqliteStateStore> {
    SqliteStateStore::new(path)
}
