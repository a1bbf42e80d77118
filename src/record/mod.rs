//! Record module for the data that flows through the pipeline
//!
//! # Components
//!
//! - `ListingReference`: Relative path of one listing, as published to the work queue
//! - `ListingRecord`: The structured extraction of one listing page

mod listing;
mod reference;

// Re-export main types
pub use listing::{ListingRecord, MILEAGE_KEY, MILEAGE_MEASUREMENT_KEY};
pub use reference::{ListingReference, ReferenceError};
