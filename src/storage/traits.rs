//! Storage traits and error types
//!
//! This module defines the trait interfaces for the listing store and the
//! completion flag, and their associated error types.

use crate::record::ListingRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt row for listing {listing_id}: {message}")]
    Corrupt { listing_id: String, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What a write did with the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// A new row was written
    Inserted,
    /// A row with the same listing id already existed and was left unchanged
    AlreadyPresent,
}

/// Trait for listing store implementations
///
/// Writes must be idempotent on `listing_id`: the work queue may deliver the
/// same reference more than once.
pub trait ListingStore: Send {
    /// Writes the record unless a row with the same listing id exists
    fn persist(&mut self, record: &ListingRecord) -> StorageResult<PersistOutcome>;

    /// Reads a listing back by id
    fn get_listing(&self, listing_id: &str) -> StorageResult<Option<ListingRecord>>;

    /// Gets total listing count
    fn count_listings(&self) -> StorageResult<u64>;
}

/// Read/write access to the "has a full crawl completed" flag
pub trait CompletionFlagStore: Send {
    /// Whether the flag is set; an absent flag reads as `false`
    fn get(&self) -> StorageResult<bool>;

    fn set(&mut self, complete: bool) -> StorageResult<()>;
}
