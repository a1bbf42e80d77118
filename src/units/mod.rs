//! Units of work
//!
//! Each unit is invoked independently by an external orchestrator, builds its
//! own HTTP client and store handles from the configuration, and reports its
//! outcome through an [`Envelope`]. Units share nothing except the durable
//! work queue and the listing database.
//!
//! | Unit          | Needs queue | Payload                          |
//! |---------------|-------------|----------------------------------|
//! | `page-count`  | no          | `{"pages_count": n}`             |
//! | `scrape-page` | yes         | `{"page": n, "page_urls": [..]}` |
//! | `process`     | yes         | batch summary                    |
//! | `check-flag`  | no          | `"scrapped"` or `"not_scrapped"` |
//! | `set-flag`    | no          | `{"message": ..}`                |
//! | `cycle`       | yes         | cycle summary                    |

mod cycle;
mod envelope;
mod flag;
mod warehouse;

pub use cycle::{crawl_cycle, CycleSummary, DrainOptions};
pub use envelope::Envelope;
pub use flag::{check_pages_scraped, set_pages_scraped, CrawlStatus, SetFlagPayload};
pub use warehouse::{
    decode_message_body, process_batch, process_message, FailedMessage, ProcessSummary,
};

use crate::config::{Config, QueueConfig};
use crate::crawler::{discover_page_count, scrape_page, SearchFilter, SiteClient};
use crate::queue::SqliteWorkQueue;
use crate::storage::{open_storage, SqliteFlagStore, SqliteStorage};
use crate::{HarvestError, Result};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Payload of the page-count unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageCountPayload {
    pub pages_count: u32,
}

/// Payload of the scrape-page unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapePayload {
    pub page: u32,
    pub page_urls: Vec<String>,
}

/// Opens the queue named by `[queue]`, failing when the section is absent
pub fn open_queue(config: &Config) -> Result<(SqliteWorkQueue, &QueueConfig)> {
    let queue_config = config.require_queue()?;
    let queue = SqliteWorkQueue::new(Path::new(&queue_config.database_path))?;
    Ok((queue, queue_config))
}

pub fn open_listing_store(config: &Config) -> Result<SqliteStorage> {
    Ok(open_storage(Path::new(&config.output.database_path))?)
}

pub fn open_flag_store(config: &Config) -> Result<SqliteFlagStore> {
    Ok(SqliteFlagStore::new(
        Path::new(&config.output.database_path),
        &config.flag.name,
    )?)
}

/// Largest batch a single `process` invocation may receive
const MAX_BATCH_SIZE: usize = 100;

/// Batch settings from `[queue]`, with `max_messages` overriding the batch size
fn drain_options(queue_config: &QueueConfig, max_messages: Option<usize>) -> Result<DrainOptions> {
    let batch_size = max_messages.unwrap_or(queue_config.batch_size);
    if !(1..=MAX_BATCH_SIZE).contains(&batch_size) {
        return Err(HarvestError::Configuration(format!(
            "batch size must be between 1 and {}, got {}",
            MAX_BATCH_SIZE, batch_size
        )));
    }

    Ok(DrainOptions {
        batch_size,
        visibility_timeout: Duration::from_secs(queue_config.visibility_timeout_secs),
    })
}

/// `page-count`: number of result pages for the standard filter
pub async fn run_page_count(config: &Config) -> Result<PageCountPayload> {
    let site = SiteClient::new(&config.site)?;
    let pages_count = discover_page_count(&site, &SearchFilter::STANDARD).await?;
    Ok(PageCountPayload { pages_count })
}

/// `scrape-page`: publishes every listing reference of one result page
///
/// The queue is opened before any request is made, so a missing queue
/// target fails without touching the site.
pub async fn run_scrape_page(config: &Config, page: u32) -> Result<ScrapePayload> {
    let (mut queue, _) = open_queue(config)?;
    let site = SiteClient::new(&config.site)?;

    let references = scrape_page(&site, page, &SearchFilter::STANDARD, &mut queue).await?;
    Ok(ScrapePayload {
        page,
        page_urls: references
            .iter()
            .map(|reference| reference.as_str().to_string())
            .collect(),
    })
}

/// `process`: extracts and stores one batch of queued listings
pub async fn run_process(config: &Config, max_messages: Option<usize>) -> Result<ProcessSummary> {
    let (mut queue, queue_config) = open_queue(config)?;
    let options = drain_options(queue_config, max_messages)?;
    let mut store = open_listing_store(config)?;
    let site = SiteClient::new(&config.site)?;

    process_batch(
        &site,
        &mut queue,
        &mut store,
        options.batch_size,
        options.visibility_timeout,
    )
    .await
}

/// `check-flag`
pub fn run_check_flag(config: &Config) -> Result<CrawlStatus> {
    let flag = open_flag_store(config)?;
    check_pages_scraped(&flag)
}

/// `set-flag`
pub fn run_set_flag(config: &Config) -> Result<SetFlagPayload> {
    let mut flag = open_flag_store(config)?;
    set_pages_scraped(&mut flag)
}

/// `cycle`: the whole pipeline in one process
pub async fn run_cycle(config: &Config) -> Result<CycleSummary> {
    let (mut queue, queue_config) = open_queue(config)?;
    let options = drain_options(queue_config, None)?;
    let mut store = open_listing_store(config)?;
    let mut flag = open_flag_store(config)?;
    let site = SiteClient::new(&config.site)?;

    crawl_cycle(
        &site,
        &SearchFilter::STANDARD,
        &mut queue,
        &mut store,
        &mut flag,
        options,
    )
    .await
}
