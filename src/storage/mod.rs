//! Storage module for persisting extracted listings
//!
//! This module handles all database operations of the pipeline, including:
//! - SQLite database initialization and schema management
//! - Idempotent listing writes keyed on the listing id
//! - The completion flag read by the external orchestrator

mod flag;
mod schema;
mod sqlite;
mod traits;

pub use flag::SqliteFlagStore;
pub use sqlite::SqliteStorage;
pub use traits::{CompletionFlagStore, ListingStore, PersistOutcome, StorageError, StorageResult};

use std::path::Path;

/// Initializes or opens the listing database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}
