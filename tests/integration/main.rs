//! Integration tests for the harvesting units
//!
//! These tests use wiremock to stand in for the listing site and in-memory
//! SQLite stores for the queue, listings and completion flag.

mod pipeline_tests;

use listing_harvester::config::SiteConfig;
use listing_harvester::crawler::SiteClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "tok123";
pub const SESSION: &str = "sess42";

/// Site configuration pointing at the mock server
pub fn site_config(base_url: &str) -> SiteConfig {
    SiteConfig {
        base_url: base_url.to_string(),
        host: None,
        language: "en".to_string(),
        accept_invalid_certs: false,
        user_agent: None,
        timeout_secs: 5,
    }
}

pub fn site_client(server: &MockServer) -> SiteClient {
    SiteClient::new(&site_config(&server.uri())).expect("Failed to build site client")
}

pub const XSRF: &str = "xsrf%3D%3D";

/// Mounts a working session handshake at `/lang/en`
pub async fn mount_handshake(server: &MockServer) {
    mount_handshake_with(server, None).await;
}

/// Handshake that also sets the anti-forgery cookie when `xsrf` is given
pub async fn mount_handshake_with(server: &MockServer, xsrf: Option<&str>) {
    let mut response = ResponseTemplate::new(200)
        .insert_header(
            "set-cookie",
            format!("autoam_session={}; path=/; httponly", SESSION).as_str(),
        )
        .set_body_string(format!(
            r#"<html><head><meta name="csrf-token" content="{}"></head><body></body></html>"#,
            TOKEN
        ))
        .insert_header("content-type", "text/html");

    if let Some(xsrf) = xsrf {
        response = response.append_header(
            "set-cookie",
            format!("XSRF-TOKEN={}; path=/; samesite=lax", xsrf).as_str(),
        );
    }

    Mock::given(method("GET"))
        .and(path("/lang/en"))
        .respond_with(response)
        .mount(server)
        .await;
}

/// A result page with the given pagination entries and card links
pub fn results_html(pagination: &[&str], cards: &[&str]) -> String {
    let entries: String = pagination
        .iter()
        .map(|entry| format!("<li><a>{}</a></li>", entry))
        .collect();
    let cards: String = cards
        .iter()
        .map(|href| {
            format!(
                r#"<div class="card"><div class="card-image"><a href="{}">car</a></div></div>"#,
                href
            )
        })
        .collect();

    format!(
        r#"<div class="results">{}</div><ul class="pagination">{}</ul>"#,
        cards, entries
    )
}

/// A complete listing page; `seller_id` of `None` drops the seller block
pub fn listing_html(seller_id: Option<&str>) -> String {
    let seller = seller_id
        .map(|id| {
            format!(
                r#"<div class="ad-seller-details"><a class="call-seller" data-sellerid="{}">Call</a></div>"#,
                id
            )
        })
        .unwrap_or_default();

    format!(
        r#"<html><body>
            <h1><a>Cars</a><a>2015</a><a>Toyota</a><a>Camry</a></h1>
            <div class="attrs"><span>07.03.2024</span><span>Armenia, Yerevan</span></div>
            <div class="offer-top-price"><div class="price"><span>$ 12 500</span></div></div>
            {}
            <table class="ad-det">
                <tr><td>Mileage</td><td>125 000 km</td></tr>
                <tr><td>Fuel Type</td><td>Gasoline</td></tr>
            </table>
        </body></html>"#,
        seller
    )
}
