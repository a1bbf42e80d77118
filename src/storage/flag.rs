//! SQLite completion flag
//!
//! The flag is a named row in the `parameters` table holding the literal
//! string `"true"` once a full crawl cycle has finished. Any other value, or
//! no row at all, means the crawl has not completed.

use crate::storage::sqlite::{open_connection, open_in_memory_connection};
use crate::storage::traits::{CompletionFlagStore, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const COMPLETE_VALUE: &str = "true";
const INCOMPLETE_VALUE: &str = "false";

/// Completion flag stored as a named parameter
pub struct SqliteFlagStore {
    conn: Connection,
    name: String,
}

impl SqliteFlagStore {
    /// Opens the parameter table in the given database file
    pub fn new(path: &Path, name: &str) -> StorageResult<Self> {
        Ok(Self {
            conn: open_connection(path)?,
            name: name.to_string(),
        })
    }

    pub fn new_in_memory(name: &str) -> StorageResult<Self> {
        Ok(Self {
            conn: open_in_memory_connection()?,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw stored value, `None` when the parameter was never written
    pub fn raw_value(&self) -> StorageResult<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM parameters WHERE name = ?1",
                params![self.name],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn write(&mut self, value: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO parameters (name, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![self.name, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

impl CompletionFlagStore for SqliteFlagStore {
    fn get(&self) -> StorageResult<bool> {
        Ok(self.raw_value()?.as_deref() == Some(COMPLETE_VALUE))
    }

    fn set(&mut self, complete: bool) -> StorageResult<()> {
        let value = if complete {
            COMPLETE_VALUE
        } else {
            INCOMPLETE_VALUE
        };
        self.write(value)
    }
}
