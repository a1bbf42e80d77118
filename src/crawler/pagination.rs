//! Pagination discoverer

use crate::crawler::fetcher::SiteClient;
use crate::crawler::search::SearchFilter;
use crate::crawler::session::acquire_session;
use crate::{HarvestError, Result};

/// Learns how many result pages the filter produces
///
/// Acquires its own session, queries page 1 and reads the pagination control.
/// A control with fewer than two entries is a single-page result set and
/// yields 1; a missing control is a parse error.
pub async fn discover_page_count(site: &SiteClient, filter: &SearchFilter) -> Result<u32> {
    let url = site.search_url()?;
    let session = acquire_session(site).await?;
    let body = site.search(&session, filter, 1).await?;

    let pagination = site
        .parser()
        .pagination(&body)
        .map_err(|source| HarvestError::Parse {
            url: url.to_string(),
            source,
        })?;

    let count = pagination.page_count();
    tracing::info!("Search reports {} result pages ({:?})", count, pagination);
    Ok(count)
}
