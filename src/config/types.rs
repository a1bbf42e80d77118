use crate::HarvestError;
use serde::Deserialize;

/// Default name of the completion flag parameter
pub const DEFAULT_FLAG_NAME: &str = "/auto.am/pages-scrapped";

/// Main configuration structure for Listing-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    /// Work queue location; units that publish or consume fail without it
    #[serde(default)]
    pub queue: Option<QueueConfig>,
    pub output: OutputConfig,
    #[serde(default)]
    pub flag: FlagConfig,
}

impl Config {
    /// Returns the queue section, or a configuration error when no queue target is set
    pub fn require_queue(&self) -> Result<&QueueConfig, HarvestError> {
        self.queue.as_ref().ok_or_else(|| {
            HarvestError::Configuration("[queue] database-path is not set".to_string())
        })
    }
}

/// Target site configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Scheme and address the site is reached at (e.g. "https://203.0.113.7")
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Host name sent in the Host and Origin headers when the site is addressed by IP
    #[serde(default)]
    pub host: Option<String>,

    /// Language segment of the session handshake path (`/lang/{language}`)
    #[serde(default = "default_language")]
    pub language: String,

    /// Accept self-signed or mismatched TLS certificates
    #[serde(rename = "accept-invalid-certs", default)]
    pub accept_invalid_certs: bool,

    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,

    /// Per-request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Durable work queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Path to the SQLite file backing the queue
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// How long a received message stays hidden before redelivery
    #[serde(
        rename = "visibility-timeout-secs",
        default = "default_visibility_timeout_secs"
    )]
    pub visibility_timeout_secs: u64,

    /// Maximum number of messages a single `process` unit receives
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database holding listings and the completion flag
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Completion flag configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FlagConfig {
    #[serde(default = "default_flag_name")]
    pub name: String,
}

impl Default for FlagConfig {
    fn default() -> Self {
        Self {
            name: default_flag_name(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_visibility_timeout_secs() -> u64 {
    300
}

fn default_batch_size() -> usize {
    10
}

fn default_flag_name() -> String {
    DEFAULT_FLAG_NAME.to_string()
}
