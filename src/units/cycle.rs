//! One complete crawl cycle, run locally
//!
//! This is the orchestration boundary: the completion flag is passed in
//! explicitly instead of being read from shared state. Pages are scraped in
//! sequence, after which the crawl counts as complete and the flag is set.
//! The queue is then drained by repeated warehouse batches; listings that
//! fail there stay queued for later `process` runs and are only reported.

use crate::crawler::{discover_page_count, scrape_page, SearchFilter, SiteClient};
use crate::queue::WorkQueue;
use crate::storage::{CompletionFlagStore, ListingStore};
use crate::units::warehouse::process_batch;
use crate::Result;
use serde::Serialize;
use std::time::Duration;

/// Queue settings used while draining
#[derive(Debug, Clone, Copy)]
pub struct DrainOptions {
    pub batch_size: usize,
    pub visibility_timeout: Duration,
}

/// Outcome of a crawl cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    /// The flag was already set, nothing was done
    pub skipped: bool,
    pub pages_count: u32,
    pub published: usize,
    pub persisted: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// Messages still queued after draining, including failed ones
    pub left_in_queue: u64,
    /// The flag was set by this cycle
    pub completed: bool,
}

/// Runs discovery and scraping, sets the flag, then drains the queue
///
/// A failing page aborts the cycle with that error, leaving the flag unset so
/// the next cycle starts over. Listing failures during the drain never
/// affect the flag.
pub async fn crawl_cycle(
    site: &SiteClient,
    filter: &SearchFilter,
    queue: &mut dyn WorkQueue,
    store: &mut dyn ListingStore,
    flag: &mut dyn CompletionFlagStore,
    options: DrainOptions,
) -> Result<CycleSummary> {
    if flag.get()? {
        tracing::info!("Crawl already completed, skipping cycle");
        return Ok(CycleSummary {
            skipped: true,
            ..Default::default()
        });
    }

    let mut summary = CycleSummary {
        pages_count: discover_page_count(site, filter).await?,
        ..Default::default()
    };

    for page in 1..=summary.pages_count {
        let references = scrape_page(site, page, filter, queue).await?;
        summary.published += references.len();
    }

    flag.set(true)?;
    summary.completed = true;
    tracing::info!(
        "All {} pages scraped, {} references published; completion flag set",
        summary.pages_count,
        summary.published
    );

    loop {
        let batch = process_batch(
            site,
            queue,
            store,
            options.batch_size,
            options.visibility_timeout,
        )
        .await?;

        summary.persisted += batch.persisted;
        summary.duplicates += batch.duplicates;
        summary.failed += batch.failed.len();

        // Stop once the queue is empty or only failing messages come back
        if batch.received == 0 || batch.succeeded() == 0 {
            break;
        }
    }

    summary.left_in_queue = queue.pending_count()?;
    if summary.failed > 0 {
        tracing::warn!(
            "{} listing deliveries failed; {} messages left for redelivery",
            summary.failed,
            summary.left_in_queue
        );
    }
    tracing::info!(
        "Crawl cycle finished: {} listings stored, {} duplicates",
        summary.persisted,
        summary.duplicates
    );

    Ok(summary)
}
