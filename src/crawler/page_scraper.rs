//! Page scraper

use crate::crawler::fetcher::SiteClient;
use crate::crawler::search::SearchFilter;
use crate::crawler::session::acquire_session;
use crate::queue::WorkQueue;
use crate::record::ListingReference;
use crate::{HarvestError, Result};

/// Scrapes one result page and publishes its listing references
///
/// Acquires a session of its own, queries `page` and publishes every
/// reference, in card order, to the work queue before returning them. A
/// failure after some references were published leaves those messages in
/// place; consumers are idempotent, so re-scraping the page is harmless.
pub async fn scrape_page(
    site: &SiteClient,
    page: u32,
    filter: &SearchFilter,
    queue: &mut dyn WorkQueue,
) -> Result<Vec<ListingReference>> {
    if page == 0 {
        return Err(HarvestError::Configuration(
            "page numbers start at 1".to_string(),
        ));
    }

    let session = acquire_session(site).await?;
    let body = site.search(&session, filter, page).await?;

    let references = site.parser().listing_references(&body);
    if references.is_empty() {
        tracing::warn!("Page {} contained no listing cards", page);
    }

    for reference in &references {
        queue.publish(reference.as_str())?;
    }

    tracing::info!(
        "Page {}: published {} listing references",
        page,
        references.len()
    );
    Ok(references)
}
