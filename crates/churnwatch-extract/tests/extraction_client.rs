//! Integration tests for `ExtractionClient` pagination and error handling.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test so no real
//! network traffic is made.

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use churnwatch_extract::{ExtractError, ExtractionClient};

/// Builds an `ExtractionClient` suitable for tests: 5-second timeout,
/// descriptive UA, no retries.
fn test_client(base: &str) -> ExtractionClient {
    ExtractionClient::new(base, None, 5, "churnwatch-test/0.1", 0, 0)
        .expect("failed to build test ExtractionClient")
}

fn test_client_with_retries(base: &str, max_retries: u32) -> ExtractionClient {
    ExtractionClient::new(base, None, 5, "churnwatch-test/0.1", max_retries, 0)
        .expect("failed to build test ExtractionClient")
}

/// Minimal one-profile page body.
fn page_json(identity: &str, next_cursor: Option<&str>) -> serde_json::Value {
    json!({
        "profiles": [{
            "identity": identity,
            "displayName": format!("Display {identity}"),
            "bio": null,
            "verified": false,
            "followersCount": 12,
            "followingCount": 34,
            "avatarUrl": null,
            "location": null
        }],
        "nextCursor": next_cursor
    })
}

#[tokio::test]
async fn fetch_all_pages_empty_page_is_valid() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/targets/someaccount/followers"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&json!({"profiles": [], "nextCursor": null})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let pages = client
        .fetch_all_follower_pages("someaccount", 200, 0)
        .await
        .expect("expected Ok for empty page");

    assert_eq!(pages.len(), 1);
    assert!(pages[0].is_empty());
}

#[tokio::test]
async fn fetch_all_pages_follows_cursors() {
    let server = MockServer::start().await;

    // First page: no cursor param, returns cursor "c2".
    Mock::given(method("GET"))
        .and(path("/v1/targets/someaccount/followers"))
        .and(query_param("limit", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&page_json("alpha", Some("c2"))))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // Second page: cursor "c2", terminal.
    Mock::given(method("GET"))
        .and(path("/v1/targets/someaccount/followers"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&page_json("beta", None)))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let pages = client
        .fetch_all_follower_pages("someaccount", 200, 0)
        .await
        .expect("expected Ok");

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0][0].identity, "alpha");
    assert_eq!(pages[1][0].identity, "beta");
}

#[tokio::test]
async fn fetch_page_maps_404_to_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/targets/ghost/followers"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .fetch_followers_page("ghost", 200, None)
        .await
        .expect_err("expected NotFound");

    assert!(matches!(err, ExtractError::NotFound { .. }), "got: {err:?}");
}

#[tokio::test]
async fn fetch_page_maps_429_to_rate_limited_with_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/targets/someaccount/followers"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "17"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .fetch_followers_page("someaccount", 200, None)
        .await
        .expect_err("expected RateLimited");

    assert!(
        matches!(err, ExtractError::RateLimited { retry_after_secs: 17 }),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn fetch_page_retries_transient_429_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/targets/someaccount/followers"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/targets/someaccount/followers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&page_json("alpha", None)))
        .mount(&server)
        .await;

    let client = test_client_with_retries(&server.uri(), 3);
    let page = client
        .fetch_followers_page("someaccount", 200, None)
        .await
        .expect("expected success after retries");

    assert_eq!(page.profiles.len(), 1);
    assert_eq!(page.profiles[0].identity, "alpha");
}

#[tokio::test]
async fn fetch_page_maps_500_to_unexpected_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/targets/someaccount/followers"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .fetch_followers_page("someaccount", 200, None)
        .await
        .expect_err("expected UnexpectedStatus");

    assert!(
        matches!(err, ExtractError::UnexpectedStatus { status: 500, .. }),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn fetch_page_maps_bad_body_to_deserialize() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/targets/someaccount/followers"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .fetch_followers_page("someaccount", 200, None)
        .await
        .expect_err("expected Deserialize");

    assert!(
        matches!(err, ExtractError::Deserialize { .. }),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn fetch_target_profile_uses_dedicated_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/targets/someaccount/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "identity": "someaccount",
            "displayName": "Some Account",
            "verified": true,
            "followersCount": 5000,
            "followingCount": 10,
            "avatarUrl": null
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let profile = client
        .fetch_target_profile("someaccount")
        .await
        .expect("expected profile");

    assert_eq!(profile.identity, "someaccount");
    assert!(profile.verified);
    assert_eq!(profile.followers_count, 5000);
}

#[tokio::test]
async fn api_key_is_sent_as_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/targets/someaccount/followers"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&page_json("alpha", None)))
        .mount(&server)
        .await;

    let client = ExtractionClient::new(
        &server.uri(),
        Some("secret-token"),
        5,
        "churnwatch-test/0.1",
        0,
        0,
    )
    .expect("client");

    let page = client
        .fetch_followers_page("someaccount", 200, None)
        .await
        .expect("expected authorized fetch to succeed");
    assert_eq!(page.profiles.len(), 1);
}
