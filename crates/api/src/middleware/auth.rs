//! Bearer token check for the live stream.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use beacon_core::Error;
use tracing::warn;

use crate::response::ApiError;
use crate::state::AppState;

/// Require `Authorization: Bearer <stream token>`.
///
/// With no token configured the stream is closed to everyone.
pub async fn require_stream_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.stream.token.as_deref() else {
        warn!("Stream request rejected: no stream token configured");
        return Err(Error::unauthorized("Live stream is disabled").into());
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
            Ok(next.run(request).await)
        }
        Some(_) => {
            warn!("Stream request rejected: invalid token");
            Err(Error::unauthorized("Invalid stream token").into())
        }
        None => Err(Error::unauthorized("Missing stream token").into()),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
