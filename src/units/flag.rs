//! Completion flag units

use crate::storage::CompletionFlagStore;
use crate::Result;
use serde::Serialize;

/// Answer given to the orchestrator polling the flag
///
/// The wire strings keep the orchestrator's spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CrawlStatus {
    #[serde(rename = "scrapped")]
    Scraped,
    #[serde(rename = "not_scrapped")]
    NotScraped,
}

/// Payload of the set-flag unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetFlagPayload {
    pub message: String,
}

/// Reads the flag; an absent or non-"true" flag means not scraped
pub fn check_pages_scraped(flag: &dyn CompletionFlagStore) -> Result<CrawlStatus> {
    let status = if flag.get()? {
        CrawlStatus::Scraped
    } else {
        CrawlStatus::NotScraped
    };
    tracing::info!("Crawl status: {:?}", status);
    Ok(status)
}

/// Marks the full crawl cycle as finished
pub fn set_pages_scraped(flag: &mut dyn CompletionFlagStore) -> Result<SetFlagPayload> {
    flag.set(true)?;
    tracing::info!("Completion flag set");
    Ok(SetFlagPayload {
        message: "Parameter written successfully".to_string(),
    })
}
