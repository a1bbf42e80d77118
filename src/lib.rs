//! Listing-Harvester: a stateless crawl-and-extraction pipeline for a car-listing site
//!
//! This crate turns the paginated search results of a single car-listing site into
//! structured rows in a relational store. The work is split into independently
//! invoked units (discover pages, scrape one page, process queued listings, read or
//! set the completion flag) that share nothing but a durable work queue and the
//! listing store.

pub mod config;
pub mod crawler;
pub mod queue;
pub mod record;
pub mod storage;
pub mod units;

use thiserror::Error;

/// Main error type for Listing-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Missing configuration: {0}")]
    Configuration(String),

    #[error("Upstream returned status {status} for {url}")]
    Upstream { url: String, status: u16 },

    #[error("Session handshake at {url} did not set the {cookie} cookie")]
    MissingSessionCookie { url: String, cookie: &'static str },

    #[error("Anti-forgery token not found in response from {url}")]
    TokenNotFound { url: String },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Parse error for {url}: {source}")]
    Parse {
        url: String,
        source: crawler::ParseError,
    },

    #[error("Invalid listing reference: {0}")]
    Reference(#[from] record::ReferenceError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] storage::StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification reported by every unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Upstream,
    Parse,
    Configuration,
    Persistence,
}

impl HarvestError {
    /// Maps the error onto the pipeline's failure taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Configuration(_) | Self::UrlParse(_) => {
                ErrorKind::Configuration
            }
            Self::Upstream { .. }
            | Self::MissingSessionCookie { .. }
            | Self::TokenNotFound { .. }
            | Self::Http { .. }
            | Self::Reqwest(_) => ErrorKind::Upstream,
            Self::Parse { .. } | Self::Reference(_) => ErrorKind::Parse,
            Self::Persistence(_) | Self::Queue(_) | Self::Serialization(_) => {
                ErrorKind::Persistence
            }
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Listing-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Pagination, SearchFilter, SessionContext};
pub use record::{ListingRecord, ListingReference};
