//! Listing extractor

use crate::crawler::fetcher::SiteClient;
use crate::crawler::session::acquire_session;
use crate::record::{ListingRecord, ListingReference};
use crate::{HarvestError, Result};

/// Fetches one listing page and parses it into a record
///
/// A fresh session is acquired for every listing. Fails with an upstream
/// error when either the handshake or the listing fetch is rejected, and
/// with a parse error when a required field is missing; the caller must then
/// leave the queue message unacknowledged.
pub async fn extract_listing(
    site: &SiteClient,
    reference: &ListingReference,
) -> Result<ListingRecord> {
    let session = acquire_session(site).await?;
    let url = site.listing_url(reference)?;
    let body = site.get_authenticated(&session, &url).await?;

    let record = site
        .parser()
        .listing(&body, reference)
        .map_err(|source| HarvestError::Parse {
            url: url.to_string(),
            source,
        })?;

    tracing::debug!(
        "Extracted listing {}: {} {} {}",
        record.listing_id,
        record.year,
        record.make,
        record.model
    );
    Ok(record)
}
