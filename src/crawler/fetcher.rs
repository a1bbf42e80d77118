//! HTTP fetcher implementation
//!
//! This module handles all HTTP traffic to the listing site, including:
//! - Building the HTTP client from the site configuration
//! - Resolving the handshake, search and listing URLs
//! - Attaching the session cookies and anti-forgery headers
//! - Classifying non-success responses as upstream errors

use crate::config::SiteConfig;
use crate::crawler::parser::{HtmlListingParser, ListingPageParser};
use crate::crawler::search::SearchFilter;
use crate::crawler::session::SessionContext;
use crate::record::ListingReference;
use crate::{HarvestError, Result};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, HOST, ORIGIN, REFERER};
use reqwest::{redirect::Policy, Client, RequestBuilder, Response};
use std::time::Duration;
use url::Url;

/// Header carrying the anti-forgery token on authenticated requests
pub const CSRF_HEADER: &str = "X-CSRF-Token";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0";

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The target site configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use listing_harvester::config::SiteConfig;
/// use listing_harvester::crawler::build_http_client;
///
/// let config = SiteConfig {
///     base_url: "https://203.0.113.7".to_string(),
///     host: Some("auto.am".to_string()),
///     language: "en".to_string(),
///     accept_invalid_certs: true,
///     user_agent: None,
///     timeout_secs: 30,
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &SiteConfig) -> std::result::Result<Client, reqwest::Error> {
    let user_agent = config
        .user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        // The site is addressed by IP, so its certificate never matches
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .gzip(true)
        .brotli(true)
        .build()
}

/// HTTP access to the listing site, together with the parser for its markup
///
/// Each unit of work builds its own `SiteClient`; nothing here is shared
/// between invocations.
pub struct SiteClient {
    client: Client,
    base_url: Url,
    host: Option<String>,
    language: String,
    parser: Box<dyn ListingPageParser>,
}

impl SiteClient {
    /// Creates a client for the configured site using the live markup parser
    pub fn new(config: &SiteConfig) -> Result<Self> {
        Self::with_parser(config, Box::new(HtmlListingParser::new()))
    }

    /// Creates a client with a custom markup parser
    pub fn with_parser(config: &SiteConfig, parser: Box<dyn ListingPageParser>) -> Result<Self> {
        let client = build_http_client(config)?;
        let base_url = Url::parse(&config.base_url)?;

        Ok(Self {
            client,
            base_url,
            host: config.host.clone(),
            language: config.language.clone(),
            parser,
        })
    }

    pub fn parser(&self) -> &dyn ListingPageParser {
        self.parser.as_ref()
    }

    /// Language-scoped root path that hands out session cookies and the token
    pub fn handshake_url(&self) -> Result<Url> {
        Ok(self.base_url.join(&format!("/lang/{}", self.language))?)
    }

    pub fn search_url(&self) -> Result<Url> {
        Ok(self.base_url.join("/search")?)
    }

    pub fn listing_url(&self, reference: &ListingReference) -> Result<Url> {
        Ok(self.base_url.join(reference.as_str())?)
    }

    /// Plain GET used by the session handshake
    pub(crate) fn handshake_request(&self, url: &Url) -> RequestBuilder {
        let request = self.client.get(url.clone()).header(ACCEPT, "*/*");
        match &self.host {
            Some(host) => request.header(HOST, host.as_str()),
            None => request,
        }
    }

    /// Issues the filtered search query for one result page
    ///
    /// Returns the HTML fragment of the result page.
    pub async fn search(
        &self,
        session: &SessionContext,
        filter: &SearchFilter,
        page: u32,
    ) -> Result<String> {
        let url = self.search_url()?;
        let query = filter.query_json(page)?;

        tracing::debug!("Searching page {} at {}", page, url);

        let request = self
            .authenticated(self.client.post(url.clone()), session)?
            .form(&[("search", query)]);

        self.fetch_text(request, &url).await
    }

    /// Fetches a page with the session's cookies and token attached
    pub async fn get_authenticated(&self, session: &SessionContext, url: &Url) -> Result<String> {
        tracing::debug!("Fetching {}", url);

        let request = self.authenticated(self.client.get(url.clone()), session)?;
        self.fetch_text(request, url).await
    }

    /// Attaches the headers every authenticated request must carry together
    fn authenticated(
        &self,
        request: RequestBuilder,
        session: &SessionContext,
    ) -> Result<RequestBuilder> {
        let referer = self.handshake_url()?;
        let origin = match &self.host {
            Some(host) => format!("{}://{}", self.base_url.scheme(), host),
            None => self.base_url.origin().ascii_serialization(),
        };

        let request = request
            .header(ACCEPT, "*/*")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .header(CSRF_HEADER, session.anti_forgery_token.as_str())
            .header("X-Requested-With", "XMLHttpRequest")
            .header(ORIGIN, origin)
            .header(REFERER, referer.as_str())
            .header(COOKIE, session.cookie_header());

        Ok(match &self.host {
            Some(host) => request.header(HOST, host.as_str()),
            None => request,
        })
    }

    /// Sends a request and fails on any non-success status
    pub(crate) async fn send_checked(&self, request: RequestBuilder, url: &Url) -> Result<Response> {
        let response = request.send().await.map_err(|source| HarvestError::Http {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("{} returned {}", url, status);
            return Err(HarvestError::Upstream {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    async fn fetch_text(&self, request: RequestBuilder, url: &Url) -> Result<String> {
        let response = self.send_checked(request, url).await?;
        response.text().await.map_err(|source| HarvestError::Http {
            url: url.to_string(),
            source,
        })
    }
}
