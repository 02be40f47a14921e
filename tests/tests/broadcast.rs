//! Committed batches reach live subscribers.

use axum::http::StatusCode;
use integration_tests::{fixtures, setup::TestContext};
use std::time::Duration;

#[tokio::test]
async fn test_committed_batch_is_broadcast() {
    let ctx = TestContext::new().await;
    let server = ctx.server();
    let (_id, mut rx) = ctx.pipeline.broadcaster().subscribe();

    server
        .post("/i")
        .add_header("X-Forwarded-For", "192.0.2.1")
        .bytes(
            fixtures::ndjson(&[
                fixtures::pageview("/first"),
                fixtures::performance(),
                fixtures::pageview("/last"),
            ])
            .into(),
        )
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let summary = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("summary should arrive")
        .expect("channel open");

    assert_eq!(summary.events, 2);
    assert_eq!(summary.performance, 1);
    assert_eq!(summary.errors, 0);
    let last = summary.last_event.expect("last event sample");
    assert_eq!(last.path, "/last");
    assert_eq!(last.domain, fixtures::SITE_DOMAIN);
}

#[tokio::test]
async fn test_failed_batch_is_not_broadcast() {
    let failing = std::sync::Arc::new(integration_tests::mocks::FailingStore::new());
    let ctx = TestContext::with_options(integration_tests::setup::TestOptions {
        records: Some(failing),
        ..Default::default()
    })
    .await;
    let server = ctx.server();
    let (_id, mut rx) = ctx.pipeline.broadcaster().subscribe();

    server
        .post("/i")
        .add_header("X-Forwarded-For", "192.0.2.2")
        .bytes(fixtures::ndjson(&[fixtures::pageview("/")]).into())
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    assert!(rx.try_recv().is_err());
}
