//! Session broker
//!
//! Every request to the site's search and listing endpoints must carry the
//! session cookie, the anti-forgery cookie and the anti-forgery token handed
//! out by a plain GET of the language root. A session is acquired fresh by
//! every unit of work and never reused, so a poisoned session only ever fails
//! the unit that obtained it.

use crate::crawler::fetcher::SiteClient;
use crate::{HarvestError, Result};
use reqwest::header::{HeaderMap, SET_COOKIE};

/// Cookie holding the server-side session id
pub const SESSION_COOKIE: &str = "autoam_session";

/// Cookie holding the anti-forgery token in its encrypted form
pub const ANTI_FORGERY_COOKIE: &str = "XSRF-TOKEN";

/// Credentials for one outbound request sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_cookie: String,
    pub anti_forgery_token: String,
    /// Some sessions are issued without this cookie
    pub anti_forgery_cookie: Option<String>,
}

impl SessionContext {
    /// Value of the `Cookie` header for authenticated requests
    pub fn cookie_header(&self) -> String {
        match &self.anti_forgery_cookie {
            Some(xsrf) => format!(
                "{}={}; {}={}",
                ANTI_FORGERY_COOKIE, xsrf, SESSION_COOKIE, self.session_cookie
            ),
            None => format!("{}={}", SESSION_COOKIE, self.session_cookie),
        }
    }
}

/// Performs the session handshake
///
/// # Request Flow
///
/// 1. GET `/lang/{language}`; a non-success status fails with `Upstream`
/// 2. Read the session and anti-forgery cookies from `Set-Cookie`
/// 3. Read the token from `<meta name="csrf-token">`; absence fails with
///    `TokenNotFound` and no further request is made
///
/// No retries are attempted; the caller's unit of work fails as a whole.
pub async fn acquire_session(site: &SiteClient) -> Result<SessionContext> {
    let url = site.handshake_url()?;
    tracing::debug!("Acquiring session from {}", url);

    let response = site
        .send_checked(site.handshake_request(&url), &url)
        .await?;

    let session_cookie = cookie_value(response.headers(), SESSION_COOKIE);
    let anti_forgery_cookie = cookie_value(response.headers(), ANTI_FORGERY_COOKIE);

    let body = response.text().await.map_err(|source| HarvestError::Http {
        url: url.to_string(),
        source,
    })?;

    let anti_forgery_token = site
        .parser()
        .anti_forgery_token(&body)
        .ok_or_else(|| HarvestError::TokenNotFound {
            url: url.to_string(),
        })?;

    let session_cookie = session_cookie.ok_or_else(|| HarvestError::MissingSessionCookie {
        url: url.to_string(),
        cookie: SESSION_COOKIE,
    })?;

    if anti_forgery_cookie.is_none() {
        tracing::debug!("Session issued without {} cookie", ANTI_FORGERY_COOKIE);
    }

    Ok(SessionContext {
        session_cookie,
        anti_forgery_token,
        anti_forgery_cookie,
    })
}

/// Finds a cookie's value among all `Set-Cookie` headers
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|set_cookie| parse_set_cookie(set_cookie, name))
}

/// Extracts the value from `name=value; Path=/; ...` when the name matches
fn parse_set_cookie(set_cookie: &str, name: &str) -> Option<String> {
    let pair = set_cookie.split(';').next()?;
    let (cookie_name, value) = pair.split_once('=')?;

    if cookie_name.trim() != name {
        return None;
    }

    let value = value.trim().trim_matches('"');
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
