//! Listing references as discovered on result pages and carried by queue messages

use std::fmt;
use thiserror::Error;
use url::Url;

/// Position of the listing id among the non-empty path segments (`/en/car/{id}/slug`)
const LISTING_ID_SEGMENT: usize = 2;

/// Errors raised when a string cannot be used as a listing reference
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("Listing reference is empty")]
    Empty,

    #[error("Listing reference '{0}' is not a site-relative path")]
    NotRelative(String),

    #[error("Listing reference '{0}' has no listing id segment")]
    MissingListingId(String),
}

/// A site-relative path uniquely identifying one listing, e.g. `/en/car/123456/slug`
///
/// Construction validates that the listing id can be derived, so every
/// reference that reaches the queue can also be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingReference {
    path: String,
}

impl ListingReference {
    /// Parses a reference from an anchor `href` or a queue message body
    ///
    /// Absolute URLs are reduced to their path (and query), so that the same
    /// listing linked as `https://auto.am/en/car/1/x` and `/en/car/1/x` yields
    /// the same reference.
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let path = if raw.starts_with('/') {
            raw.to_string()
        } else {
            match Url::parse(raw) {
                Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                    match url.query() {
                        Some(query) => format!("{}?{}", url.path(), query),
                        None => url.path().to_string(),
                    }
                }
                _ => return Err(ReferenceError::NotRelative(raw.to_string())),
            }
        };

        let reference = Self { path };
        if reference.id_segment().is_none() {
            return Err(ReferenceError::MissingListingId(reference.path));
        }

        Ok(reference)
    }

    /// The relative path, exactly as sent in the listing request and queue message
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// The stable listing id used as the persistence key
    pub fn listing_id(&self) -> &str {
        // parse() guarantees the segment exists
        self.id_segment().unwrap_or_default()
    }

    fn id_segment(&self) -> Option<&str> {
        let path = self.path.split(['?', '#']).next().unwrap_or_default();
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .nth(LISTING_ID_SEGMENT)
    }
}

impl fmt::Display for ListingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
