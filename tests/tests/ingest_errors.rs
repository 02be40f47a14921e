//! Error paths of the ingest endpoint.

use axum::http::StatusCode;
use integration_tests::{
    fixtures,
    mocks::FailingStore,
    setup::{TestContext, TestOptions},
};
use sqlite_store::Table;
use std::sync::Arc;

/// Requests past the per-IP window get 429 with Retry-After.
#[tokio::test]
async fn test_rate_limit_returns_429() {
    let ctx = TestContext::with_options(TestOptions {
        rate_limit: 2,
        ..Default::default()
    })
    .await;
    let server = ctx.server();

    for _ in 0..2 {
        server
            .post("/i")
            .add_header("X-Forwarded-For", "198.51.100.1")
            .bytes(fixtures::ndjson(&[fixtures::pageview("/")]).into())
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    let response = server
        .post("/i")
        .add_header("X-Forwarded-For", "198.51.100.1")
        .bytes(fixtures::ndjson(&[fixtures::pageview("/")]).into())
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .header("retry-after")
        .to_str()
        .expect("Retry-After should be ASCII")
        .parse()
        .expect("Retry-After should be seconds");
    assert!((1..=60).contains(&retry_after));

    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "RATE_001");

    // Other clients are unaffected.
    server
        .post("/i")
        .add_header("X-Forwarded-For", "198.51.100.2")
        .bytes(fixtures::ndjson(&[fixtures::pageview("/")]).into())
        .await
        .assert_status(StatusCode::NO_CONTENT);

    assert_eq!(ctx.count(Table::Events).await, 3);
}

/// Store failure surfaces as 500 without leaking the cause.
#[tokio::test]
async fn test_store_failure_returns_500() {
    let failing = Arc::new(FailingStore::new());
    let ctx = TestContext::with_options(TestOptions {
        records: Some(failing.clone()),
        ..Default::default()
    })
    .await;
    let server = ctx.server();

    let response = server
        .post("/i")
        .add_header("X-Forwarded-For", "198.51.100.3")
        .bytes(fixtures::ndjson(&fixtures::pageviews(2)).into())
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "DB_001");
    assert!(!body["error"].as_str().unwrap_or("").contains("disk"));
    assert_eq!(failing.attempts(), 1);
}

/// A body with nothing usable never reaches the store.
#[tokio::test]
async fn test_empty_body_skips_store() {
    let failing = Arc::new(FailingStore::new());
    let ctx = TestContext::with_options(TestOptions {
        records: Some(failing.clone()),
        ..Default::default()
    })
    .await;
    let server = ctx.server();

    server
        .post("/i")
        .add_header("X-Forwarded-For", "198.51.100.4")
        .bytes("\n\n{bad".into())
        .await
        .assert_status(StatusCode::NO_CONTENT);

    assert_eq!(failing.attempts(), 0);
}

/// Bodies over 1 MiB are rejected before parsing.
#[tokio::test]
async fn test_oversized_body_returns_400() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let response = server
        .post("/i")
        .add_header("X-Forwarded-For", "198.51.100.5")
        .bytes(fixtures::oversized_body().into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    let code = body["code"].as_str().unwrap_or("");
    assert!(code == "VALID_001" || code == "VALID_002", "got {}", code);
    assert_eq!(ctx.count(Table::Events).await, 0);
}
