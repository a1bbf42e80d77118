//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ListingStore trait.

use crate::record::ListingRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ListingStore, PersistOutcome, StorageError, StorageResult};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

/// Opens a database file with the pragmas every store connection uses
pub(crate) fn open_connection(path: &Path) -> StorageResult<Connection> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA temp_store = MEMORY;
    ",
    )?;

    initialize_schema(&conn)?;
    Ok(conn)
}

pub(crate) fn open_in_memory_connection() -> StorageResult<Connection> {
    let conn = Connection::open_in_memory()?;
    initialize_schema(&conn)?;
    Ok(conn)
}

/// SQLite listing store
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        Ok(Self {
            conn: open_connection(path)?,
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        Ok(Self {
            conn: open_in_memory_connection()?,
        })
    }
}

/// Raw column values of one `cars_raw_data` row
struct ListingRow {
    listing_id: String,
    year: u16,
    make: String,
    model: String,
    vin: Option<String>,
    is_urgent: bool,
    is_exchangeable: bool,
    pay_with_installments: bool,
    insert_date: String,
    location: Option<String>,
    price: String,
    seller_id: String,
    details: String,
    options: Option<String>,
}

impl ListingRow {
    fn into_record(self) -> StorageResult<ListingRecord> {
        let insert_date = NaiveDate::parse_from_str(&self.insert_date, "%Y-%m-%d").map_err(|e| {
            StorageError::Corrupt {
                listing_id: self.listing_id.clone(),
                message: format!("insert_date '{}': {}", self.insert_date, e),
            }
        })?;
        let details: BTreeMap<String, String> = serde_json::from_str(&self.details)?;

        Ok(ListingRecord {
            listing_id: self.listing_id,
            year: self.year,
            make: self.make,
            model: self.model,
            vin: self.vin,
            price: self.price,
            is_exchangeable: self.is_exchangeable,
            pay_with_installments: self.pay_with_installments,
            is_urgent: self.is_urgent,
            insert_date,
            location: self.location,
            seller_id: self.seller_id,
            details,
            options: self.options,
        })
    }
}

impl ListingStore for SqliteStorage {
    fn persist(&mut self, record: &ListingRecord) -> StorageResult<PersistOutcome> {
        let details = serde_json::to_string(&record.details)?;
        let now = Utc::now().to_rfc3339();

        // A redelivered reference keeps the first row; records never change after extraction
        let inserted = self.conn.execute(
            "INSERT INTO cars_raw_data (
                listing_id, year, make, model, vin, is_urgent, is_exchangable,
                pay_with_installments, insert_date, location, price, seller_id,
                details, options, scraped_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(listing_id) DO NOTHING",
            params![
                record.listing_id,
                record.year,
                record.make,
                record.model,
                record.vin,
                record.is_urgent,
                record.is_exchangeable,
                record.pay_with_installments,
                record.insert_date_string(),
                record.location,
                record.price,
                record.seller_id,
                details,
                record.options,
                now,
            ],
        )?;

        if inserted == 0 {
            tracing::debug!("Listing {} already stored", record.listing_id);
            Ok(PersistOutcome::AlreadyPresent)
        } else {
            Ok(PersistOutcome::Inserted)
        }
    }

    fn get_listing(&self, listing_id: &str) -> StorageResult<Option<ListingRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT listing_id, year, make, model, vin, is_urgent, is_exchangable,
             pay_with_installments, insert_date, location, price, seller_id, details, options
             FROM cars_raw_data WHERE listing_id = ?1",
        )?;

        let row = stmt
            .query_row(params![listing_id], |row| {
                Ok(ListingRow {
                    listing_id: row.get(0)?,
                    year: row.get(1)?,
                    make: row.get(2)?,
                    model: row.get(3)?,
                    vin: row.get(4)?,
                    is_urgent: row.get(5)?,
                    is_exchangeable: row.get(6)?,
                    pay_with_installments: row.get(7)?,
                    insert_date: row.get(8)?,
                    location: row.get(9)?,
                    price: row.get(10)?,
                    seller_id: row.get(11)?,
                    details: row.get(12)?,
                    options: row.get(13)?,
                })
            })
            .optional()?;

        row.map(ListingRow::into_record).transpose()
    }

    fn count_listings(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cars_raw_data", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
