//! Tests for health check endpoints.

use axum::http::StatusCode;
use integration_tests::setup::TestContext;

/// /health reports the database component and subscriber count
#[tokio::test]
async fn test_health_endpoint_structure() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
    assert!(body["active_subscribers"].as_u64().is_some());

    let components = body["components"].as_array().expect("components array");
    assert!(components.iter().any(|c| c["name"] == "database"));
}

/// Readiness follows the database probe
#[tokio::test]
async fn test_ready_endpoint() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    server.get("/health/ready").await.assert_status_ok();
}

#[tokio::test]
async fn test_live_endpoint() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    server.get("/health/live").await.assert_status_ok();
}

/// Health endpoints are public
#[tokio::test]
async fn test_health_endpoints_no_auth_required() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    for path in ["/health", "/health/ready", "/health/live"] {
        let response = server.get(path).await;
        assert_ne!(
            response.status_code(),
            StatusCode::UNAUTHORIZED,
            "{} should not require auth",
            path
        );
    }
}
