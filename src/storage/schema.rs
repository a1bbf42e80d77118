//! Database schema definitions
//!
//! This module contains the SQL schema of the listing database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per listing, keyed on the id derived from its reference
CREATE TABLE IF NOT EXISTS cars_raw_data (
    listing_id TEXT PRIMARY KEY,
    year INTEGER NOT NULL,
    make TEXT NOT NULL,
    model TEXT NOT NULL,
    vin TEXT,
    is_urgent INTEGER NOT NULL,
    is_exchangable INTEGER NOT NULL,
    pay_with_installments INTEGER NOT NULL,
    insert_date TEXT NOT NULL,
    location TEXT,
    price TEXT NOT NULL,
    seller_id TEXT NOT NULL,
    details TEXT NOT NULL,
    options TEXT,
    scraped_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cars_seller ON cars_raw_data(seller_id);
CREATE INDEX IF NOT EXISTS idx_cars_insert_date ON cars_raw_data(insert_date);

-- Named parameters shared with the external orchestrator (completion flag)
CREATE TABLE IF NOT EXISTS parameters (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
