use crate::config::types::{Config, FlagConfig, OutputConfig, QueueConfig, SiteConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    if let Some(queue) = &config.queue {
        validate_queue_config(queue)?;
    }
    validate_output_config(&config.output)?;
    validate_flag_config(&config.flag)?;
    Ok(())
}

/// Validates target site configuration
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' has no host",
            config.base_url
        )));
    }

    if let Some(host) = &config.host {
        validate_host(host)?;
    }

    if config.language.is_empty() || !config.language.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConfigError::Validation(format!(
            "language must be a non-empty alphabetic code, got '{}'",
            config.language
        )));
    }

    if config.timeout_secs < 1 || config.timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be between 1 and 300, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

/// Validates a Host header override
fn validate_host(host: &str) -> Result<(), ConfigError> {
    if host.is_empty() {
        return Err(ConfigError::Validation("host cannot be empty".to_string()));
    }

    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':')
    {
        return Err(ConfigError::Validation(format!(
            "host '{}' contains invalid characters",
            host
        )));
    }

    Ok(())
}

/// Twelve hours, the longest a received message may stay hidden
const MAX_VISIBILITY_TIMEOUT_SECS: u64 = 43_200;

/// Validates work queue configuration
fn validate_queue_config(config: &QueueConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "queue database-path cannot be empty".to_string(),
        ));
    }

    if config.visibility_timeout_secs < 1
        || config.visibility_timeout_secs > MAX_VISIBILITY_TIMEOUT_SECS
    {
        return Err(ConfigError::Validation(format!(
            "visibility-timeout-secs must be between 1 and {}, got {}",
            MAX_VISIBILITY_TIMEOUT_SECS,
            config.visibility_timeout_secs
        )));
    }

    if config.batch_size < 1 || config.batch_size > 100 {
        return Err(ConfigError::Validation(format!(
            "batch-size must be between 1 and 100, got {}",
            config.batch_size
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "output database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_flag_config(config: &FlagConfig) -> Result<(), ConfigError> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "flag name cannot be empty".to_string(),
        ));
    }

    Ok(())
}
