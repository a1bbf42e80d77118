//! The structured record extracted from one listing page

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Details key holding the numeric mileage after splitting
pub const MILEAGE_KEY: &str = "mileage";

/// Details key holding the mileage unit after splitting
pub const MILEAGE_MEASUREMENT_KEY: &str = "mileage_measurement";

/// Canonical extraction of one car listing
///
/// Optional fields are `None` when the listing page does not carry the
/// corresponding element; required fields are always populated, since the
/// parser fails instead of producing a partial record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Stable id derived from the listing reference, used as the persistence key
    pub listing_id: String,

    pub year: u16,
    pub make: String,
    pub model: String,
    pub vin: Option<String>,

    /// Price as displayed, whitespace removed and lower-cased (e.g. "$12,500")
    pub price: String,
    pub is_exchangeable: bool,
    pub pay_with_installments: bool,
    pub is_urgent: bool,

    /// Date the listing was posted
    pub insert_date: NaiveDate,
    pub location: Option<String>,
    pub seller_id: String,

    /// Details table, keys in lower snake case
    pub details: BTreeMap<String, String>,

    /// Free-text options block
    pub options: Option<String>,
}

impl ListingRecord {
    /// Insert date in the `YYYY-MM-DD` form used by the store
    pub fn insert_date_string(&self) -> String {
        self.insert_date.format("%Y-%m-%d").to_string()
    }

    /// Numeric mileage, when the details table carried one
    pub fn mileage(&self) -> Option<&str> {
        self.details.get(MILEAGE_KEY).map(String::as_str)
    }

    /// Mileage unit (e.g. "km" or "mi"), when the details table carried one
    pub fn mileage_measurement(&self) -> Option<&str> {
        self.details.get(MILEAGE_MEASUREMENT_KEY).map(String::as_str)
    }
}
