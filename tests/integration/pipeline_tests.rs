//! End-to-end tests of session, discovery, scraping, processing and the flag

use crate::*;
use listing_harvester::config::parse_config;
use listing_harvester::crawler::{
    acquire_session, discover_page_count, extract_listing, scrape_page, SearchFilter,
    CSRF_HEADER,
};
use listing_harvester::ListingReference;
use listing_harvester::queue::{SqliteWorkQueue, WorkQueue};
use listing_harvester::storage::{
    CompletionFlagStore, ListingStore, SqliteFlagStore, SqliteStorage,
};
use listing_harvester::units::{self, crawl_cycle, process_batch, process_message, DrainOptions};
use listing_harvester::{ErrorKind, HarvestError};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VISIBILITY: Duration = Duration::from_secs(300);

async fn mount_search(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header(CSRF_HEADER, TOKEN))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .and(body_string_contains("search="))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, listing_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(listing_path))
        .and(header(CSRF_HEADER, TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_session_handshake() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;

    let session = acquire_session(&site_client(&server)).await.unwrap();

    assert_eq!(session.session_cookie, SESSION);
    assert_eq!(session.anti_forgery_token, TOKEN);
    assert_eq!(session.anti_forgery_cookie, None);
    assert_eq!(session.cookie_header(), format!("autoam_session={}", SESSION));
}

#[tokio::test]
async fn test_authenticated_requests_carry_both_cookies_and_token() {
    let server = MockServer::start().await;
    mount_handshake_with(&server, Some(XSRF)).await;

    let cookie = format!("XSRF-TOKEN={}; autoam_session={}", XSRF, SESSION);

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header(CSRF_HEADER, TOKEN))
        .and(header("cookie", cookie.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_html(&["1"], &[])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/en/car/123456/toyota-camry"))
        .and(header(CSRF_HEADER, TOKEN))
        .and(header("cookie", cookie.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(Some("4411"))))
        .expect(1)
        .mount(&server)
        .await;

    let site = site_client(&server);

    let session = acquire_session(&site).await.unwrap();
    assert_eq!(session.anti_forgery_cookie.as_deref(), Some(XSRF));
    assert_eq!(session.cookie_header(), cookie);

    let count = discover_page_count(&site, &SearchFilter::STANDARD)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let reference = ListingReference::parse("/en/car/123456/toyota-camry").unwrap();
    let record = extract_listing(&site, &reference).await.unwrap();
    assert_eq!(record.listing_id, "123456");
}

#[tokio::test]
async fn test_search_server_error() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let site = site_client(&server);

    let err = discover_page_count(&site, &SearchFilter::STANDARD)
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Upstream { status: 500, .. }));
    assert_eq!(err.kind(), ErrorKind::Upstream);

    let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
    let err = scrape_page(&site, 3, &SearchFilter::STANDARD, &mut queue)
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Upstream { status: 500, .. }));
    assert_eq!(queue.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn test_missing_token_stops_before_search() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/lang/en"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "autoam_session=sess42; path=/")
                .set_body_string("<html><head></head><body>maintenance</body></html>"),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = discover_page_count(&site_client(&server), &SearchFilter::STANDARD)
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::TokenNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::Upstream);
}

#[tokio::test]
async fn test_handshake_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/lang/en"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = discover_page_count(&site_client(&server), &SearchFilter::STANDARD)
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::Upstream { status: 500, .. }));
    assert_eq!(err.kind(), ErrorKind::Upstream);
}

#[tokio::test]
async fn test_discover_page_count() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    mount_search(&server, results_html(&["1", "2", "3", "42", "»"], &[])).await;

    let count = discover_page_count(&site_client(&server), &SearchFilter::STANDARD)
        .await
        .unwrap();
    assert_eq!(count, 42);
}

#[tokio::test]
async fn test_discover_single_page() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    mount_search(&server, results_html(&["1"], &["/en/car/1/a"])).await;

    let count = discover_page_count(&site_client(&server), &SearchFilter::STANDARD)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_scrape_page_publishes_in_card_order() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    mount_search(
        &server,
        results_html(&["1", "2", "»"], &["/en/car/3/c", "/en/car/1/a", "/en/car/2/b"]),
    )
    .await;

    let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
    let references = scrape_page(&site_client(&server), 2, &SearchFilter::STANDARD, &mut queue)
        .await
        .unwrap();

    assert_eq!(references.len(), 3);
    let bodies: Vec<String> = queue
        .receive(10, VISIBILITY)
        .unwrap()
        .into_iter()
        .map(|message| message.body)
        .collect();
    assert_eq!(bodies, vec!["/en/car/3/c", "/en/car/1/a", "/en/car/2/b"]);
}

#[tokio::test]
async fn test_scrape_without_queue_makes_no_requests() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = parse_config(&format!(
        r#"
[site]
base-url = "{}"

[output]
database-path = "{}"
"#,
        server.uri(),
        dir.path().join("listings.db").display()
    ))
    .unwrap();

    let err = units::run_scrape_page(&config, 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_process_persists_and_acknowledges() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    mount_listing(&server, "/en/car/123456/toyota-camry", listing_html(Some("4411"))).await;

    let site = site_client(&server);
    let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
    let mut store = SqliteStorage::new_in_memory().unwrap();
    queue.publish("/en/car/123456/toyota-camry").unwrap();

    let summary = process_batch(&site, &mut queue, &mut store, 10, VISIBILITY)
        .await
        .unwrap();

    assert_eq!(summary.received, 1);
    assert_eq!(summary.persisted, 1);
    assert!(summary.failed.is_empty());
    assert_eq!(queue.pending_count().unwrap(), 0);

    let record = store.get_listing("123456").unwrap().unwrap();
    assert_eq!(record.year, 2015);
    assert_eq!(record.make, "Toyota");
    assert_eq!(record.seller_id, "4411");
    assert_eq!(record.location.as_deref(), Some("Yerevan"));
    assert_eq!(record.mileage(), Some("125000"));
    assert_eq!(record.mileage_measurement(), Some("km"));
}

#[tokio::test]
async fn test_parse_failure_leaves_message_queued() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    mount_listing(&server, "/en/car/777/no-seller", listing_html(None)).await;

    let site = site_client(&server);
    let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
    let mut store = SqliteStorage::new_in_memory().unwrap();
    queue.publish("/en/car/777/no-seller").unwrap();

    let message = queue.receive(1, VISIBILITY).unwrap().remove(0);
    let err = process_message(&site, &mut queue, &mut store, &message)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Parse);
    assert_eq!(queue.pending_count().unwrap(), 1);
    assert_eq!(store.count_listings().unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_delivery_stores_one_row() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    mount_listing(&server, "/en/car/123456/toyota-camry", listing_html(Some("4411"))).await;

    let site = site_client(&server);
    let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
    let mut store = SqliteStorage::new_in_memory().unwrap();
    queue.publish("/en/car/123456/toyota-camry").unwrap();
    queue.publish("/en/car/123456/toyota-camry").unwrap();

    let summary = process_batch(&site, &mut queue, &mut store, 10, VISIBILITY)
        .await
        .unwrap();

    assert_eq!(summary.persisted, 1);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(store.count_listings().unwrap(), 1);
    assert_eq!(queue.pending_count().unwrap(), 0);
}

#[tokio::test]
async fn test_listing_fetch_rejected() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;

    Mock::given(method("GET"))
        .and(path("/en/car/5/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let site = site_client(&server);
    let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
    let mut store = SqliteStorage::new_in_memory().unwrap();
    queue.publish("/en/car/5/gone").unwrap();

    let summary = process_batch(&site, &mut queue, &mut store, 10, VISIBILITY)
        .await
        .unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert!(!summary.failed[0].acknowledged);
    assert_eq!(queue.pending_count().unwrap(), 1);
}

#[tokio::test]
async fn test_crawl_cycle_sets_flag_once() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;
    mount_search(&server, results_html(&["1"], &["/en/car/1/a", "/en/car/2/b"])).await;
    mount_listing(&server, "/en/car/1/a", listing_html(Some("10"))).await;
    mount_listing(&server, "/en/car/2/b", listing_html(Some("20"))).await;

    let site = site_client(&server);
    let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
    let mut store = SqliteStorage::new_in_memory().unwrap();
    let mut flag = SqliteFlagStore::new_in_memory("/auto.am/pages-scrapped").unwrap();
    let options = DrainOptions {
        batch_size: 1,
        visibility_timeout: VISIBILITY,
    };

    assert!(!flag.get().unwrap());

    let summary = crawl_cycle(
        &site,
        &SearchFilter::STANDARD,
        &mut queue,
        &mut store,
        &mut flag,
        options,
    )
    .await
    .unwrap();

    assert!(!summary.skipped);
    assert!(summary.completed);
    assert_eq!(summary.pages_count, 1);
    assert_eq!(summary.published, 2);
    assert_eq!(summary.persisted, 2);
    assert_eq!(summary.left_in_queue, 0);
    assert_eq!(store.count_listings().unwrap(), 2);
    assert!(flag.get().unwrap());

    let again = crawl_cycle(
        &site,
        &SearchFilter::STANDARD,
        &mut queue,
        &mut store,
        &mut flag,
        options,
    )
    .await
    .unwrap();
    assert!(again.skipped);
    assert_eq!(store.count_listings().unwrap(), 2);
}

#[tokio::test]
async fn test_permanently_failing_listing_does_not_block_completion() {
    let server = MockServer::start().await;
    mount_handshake(&server).await;

    // Discovery and the single page scrape of the first cycle only
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header(CSRF_HEADER, TOKEN))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(results_html(&["1"], &["/en/car/1/a", "/en/car/2/sold"])),
        )
        .expect(2)
        .mount(&server)
        .await;

    mount_listing(&server, "/en/car/1/a", listing_html(Some("10"))).await;
    Mock::given(method("GET"))
        .and(path("/en/car/2/sold"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let site = site_client(&server);
    let mut queue = SqliteWorkQueue::new_in_memory().unwrap();
    let mut store = SqliteStorage::new_in_memory().unwrap();
    let mut flag = SqliteFlagStore::new_in_memory("/auto.am/pages-scrapped").unwrap();
    let options = DrainOptions {
        batch_size: 10,
        visibility_timeout: Duration::ZERO,
    };

    let first = crawl_cycle(
        &site,
        &SearchFilter::STANDARD,
        &mut queue,
        &mut store,
        &mut flag,
        options,
    )
    .await
    .unwrap();

    assert!(first.completed);
    assert_eq!(first.published, 2);
    assert_eq!(first.persisted, 1);
    assert!(first.failed >= 1);
    assert_eq!(first.left_in_queue, 1);
    assert!(flag.get().unwrap());

    let second = crawl_cycle(
        &site,
        &SearchFilter::STANDARD,
        &mut queue,
        &mut store,
        &mut flag,
        options,
    )
    .await
    .unwrap();

    assert!(second.skipped);
    assert_eq!(queue.pending_count().unwrap(), 1);
    assert_eq!(store.count_listings().unwrap(), 1);
}
