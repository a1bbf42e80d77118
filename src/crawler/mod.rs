//! Crawler module for talking to the listing site
//!
//! This module contains the site-facing half of the pipeline, including:
//! - Session acquisition (cookies plus anti-forgery token)
//! - Search queries and pagination discovery
//! - Result page scraping into listing references
//! - Listing page extraction into records
//!
//! All markup knowledge is confined to the `ListingPageParser` implementation
//! in `parser`.

mod extractor;
mod fetcher;
mod page_scraper;
mod pagination;
mod parser;
mod search;
mod session;

pub use extractor::extract_listing;
pub use fetcher::{build_http_client, SiteClient, CSRF_HEADER};
pub use page_scraper::scrape_page;
pub use pagination::discover_page_count;
pub use parser::{HtmlListingParser, ListingPageParser, Pagination, ParseError};
pub use search::{Bounds, SearchFilter, UserFilter};
pub use session::{acquire_session, SessionContext, ANTI_FORGERY_COOKIE, SESSION_COOKIE};
