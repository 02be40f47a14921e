//! Request extractors.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use beacon_core::host::host_of;

/// Whether `X-Forwarded-For` / `X-Real-IP` name the client.
///
/// Clients can set these headers freely, so trusting them is only sound when
/// a reverse proxy overwrites them. Without one, set this to false and the
/// socket peer keys the rate limiter instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyTrust(pub bool);

impl Default for ProxyTrust {
    fn default() -> Self {
        Self(true)
    }
}

/// Client IP address.
///
/// With [`ProxyTrust`] on: `X-Forwarded-For` (first hop), then `X-Real-IP`,
/// then the socket peer. With it off, only the socket peer. Falls back to
/// `"unknown"` so it can always key the rate limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    ProxyTrust: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ProxyTrust(trusted) = ProxyTrust::from_ref(state);
        if trusted {
            if let Some(ip) = forwarded_ip(&parts.headers) {
                return Ok(ClientIp(ip));
            }
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientIp(peer.unwrap_or_else(|| "unknown".to_string())))
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let xff = headers
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = xff {
        return Some(ip.to_string());
    }

    headers
        .get("X-Real-IP")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// Headers the ingestion pipeline reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    pub user_agent: String,
    pub accept_language: Option<String>,
    /// Normalized Origin host, else Referer host
    pub origin_host: Option<String>,
}

impl RequestHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        };

        let origin_host = text(header::ORIGIN)
            .as_deref()
            .and_then(host_of)
            .or_else(|| text(header::REFERER).as_deref().and_then(host_of));

        Self {
            user_agent: text(header::USER_AGENT).unwrap_or_default(),
            accept_language: text(header::ACCEPT_LANGUAGE),
            origin_host,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestHeaders
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
