//! Ingestion endpoint handler.
//!
//! `POST /i` takes newline-delimited JSON from the browser tracker. Bad lines
//! are skipped silently, so a readable body always gets `204` unless the
//! store fails.

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, HeaderMap, StatusCode},
};
use beacon_core::error::ValidationErrorCode;
use beacon_core::limits::MAX_BODY_BYTES;
use beacon_core::Error;
use chrono::Utc;
use telemetry::metrics;
use tracing::{error, warn};

use crate::extractors::{ClientIp, RequestHeaders};
use crate::pipeline::IngestRequest;
use crate::response::ApiError;
use crate::state::AppState;

/// POST /i
pub async fn ingest_handler(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    headers: RequestHeaders,
    raw_headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, ApiError> {
    metrics().requests_received.inc();

    state.pipeline.admit(&client_ip)?;

    if declared_length(&raw_headers).is_some_and(|len| len > MAX_BODY_BYTES as u64) {
        metrics().requests_rejected.inc();
        return Err(Error::validation_code(
            ValidationErrorCode::BodyTooLarge,
            format!("Body exceeds {}KB limit", MAX_BODY_BYTES / 1024),
        )
        .into());
    }

    // Also enforces the cap on bodies without a Content-Length.
    let body = to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
        metrics().requests_rejected.inc();
        warn!(error = %e, "Unreadable ingestion body");
        ApiError::from(Error::validation_code(ValidationErrorCode::Unreadable, e.to_string()))
    })?;

    let request = IngestRequest {
        body,
        client_ip,
        headers,
        received_at: Utc::now(),
    };

    // Once parsing starts the batch runs to completion even if the client
    // hangs up, so a spawned task owns it.
    let pipeline = state.pipeline.clone();
    let outcome = tokio::spawn(async move { pipeline.ingest(request).await })
        .await
        .map_err(|e| {
            error!(error = %e, "Ingestion task failed");
            ApiError::internal("Ingestion task failed")
        })?;

    match outcome {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            metrics().requests_rejected.inc();
            Err(e.into())
        }
    }
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
