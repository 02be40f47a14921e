//! End-to-end tests for the ingest pipeline.
//!
//! POST /i → Pipeline → in-memory SQLite, through the real router with all
//! middleware.

use integration_tests::{fixtures, setup::TestContext};
use sqlite_store::Table;

/// Mixed NDJSON body lands in all three tables.
#[tokio::test]
async fn test_ingest_mixed_kinds_e2e() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let body = fixtures::ndjson(&[
        fixtures::pageview("/"),
        fixtures::custom_event("signup"),
        fixtures::performance(),
        fixtures::error_line(),
    ]);

    let response = server
        .post("/i")
        .add_header("Origin", fixtures::ORIGIN)
        .add_header("User-Agent", fixtures::CHROME_UA)
        .add_header("X-Forwarded-For", "203.0.113.7")
        .bytes(body.into())
        .await;

    response.assert_status(axum::http::StatusCode::NO_CONTENT);

    assert_eq!(ctx.count(Table::Events).await, 2);
    assert_eq!(ctx.count(Table::Performance).await, 1);
    assert_eq!(ctx.count(Table::Errors).await, 1);
}

/// Lines from one client in one request share a session and visitor.
#[tokio::test]
async fn test_ingest_shares_session_e2e() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let response = server
        .post("/i")
        .add_header("User-Agent", fixtures::CHROME_UA)
        .add_header("X-Forwarded-For", "203.0.113.8")
        .bytes(fixtures::ndjson(&fixtures::pageviews(5)).into())
        .await;
    response.assert_status(axum::http::StatusCode::NO_CONTENT);

    let rows: Vec<(String, String, String)> =
        sqlx::query_as("SELECT session_id, visitor_hash, domain FROM events")
            .fetch_all(ctx.store.pool())
            .await
            .expect("Query failed");

    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|r| r.0 == rows[0].0), "one session expected");
    assert!(rows.iter().all(|r| r.1 == rows[0].1), "one visitor expected");
    assert_eq!(rows[0].0.len(), 32);
    assert!(rows.iter().all(|r| r.2 == fixtures::SITE_DOMAIN));
}

/// Malformed lines are skipped, the rest persist.
#[tokio::test]
async fn test_ingest_skips_bad_lines_e2e() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let body = format!(
        "{}\nnot json at all\n[1,2,3]\n{}\n\n{}",
        fixtures::pageview("/a"),
        serde_json::json!({ "type": "event", "site_id": "nope", "url": "https://example.com/" }),
        fixtures::pageview("/b"),
    );

    let response = server
        .post("/i")
        .add_header("X-Forwarded-For", "203.0.113.9")
        .bytes(body.into())
        .await;

    response.assert_status(axum::http::StatusCode::NO_CONTENT);
    assert_eq!(ctx.count(Table::Events).await, 2);
}

/// Lines posted from a foreign origin are dropped.
#[tokio::test]
async fn test_ingest_rejects_foreign_origin_e2e() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let response = server
        .post("/i")
        .add_header("Origin", "https://evil.test")
        .add_header("X-Forwarded-For", "203.0.113.10")
        .bytes(fixtures::ndjson(&fixtures::pageviews(3)).into())
        .await;

    response.assert_status(axum::http::StatusCode::NO_CONTENT);
    assert_eq!(ctx.count(Table::Events).await, 0);
}

/// Known crawlers are stored and labelled.
#[tokio::test]
async fn test_ingest_labels_good_bot_e2e() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let response = server
        .post("/i")
        .add_header("User-Agent", fixtures::GOOGLEBOT_UA)
        .add_header("X-Forwarded-For", "66.249.66.1")
        .bytes(fixtures::ndjson(&[fixtures::pageview("/")]).into())
        .await;
    response.assert_status(axum::http::StatusCode::NO_CONTENT);

    let (category, signals): (String, String) =
        sqlx::query_as("SELECT bot_category, bot_signals FROM events")
            .fetch_one(ctx.store.pool())
            .await
            .expect("Query failed");

    assert_eq!(category, "good_bot");
    let signals: serde_json::Value = serde_json::from_str(&signals).expect("signals are JSON");
    assert!(signals.is_array());
}

/// Empty registry admits every line under the request host.
#[tokio::test]
async fn test_ingest_bootstrap_without_sites_e2e() {
    let ctx = TestContext::with_options(integration_tests::setup::TestOptions {
        seed_site: false,
        ..Default::default()
    })
    .await;
    let server = ctx.server();

    let response = server
        .post("/i")
        .add_header("Origin", "https://www.blog.test")
        .add_header("X-Forwarded-For", "203.0.113.11")
        .bytes(fixtures::ndjson(&[fixtures::pageview("/")]).into())
        .await;
    response.assert_status(axum::http::StatusCode::NO_CONTENT);

    let domain: (String,) = sqlx::query_as("SELECT domain FROM events")
        .fetch_one(ctx.store.pool())
        .await
        .expect("Query failed");
    assert_eq!(domain.0, "blog.test");
}
