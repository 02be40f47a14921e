//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;

use crate::extractors::ProxyTrust;
use crate::pipeline::{start_rate_limiter_cleanup, Pipeline};

/// Rate limiter sweep period (5 minutes).
const RATE_LIMITER_SWEEP: Duration = Duration::from_secs(300);

/// Live stream settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Bearer token for `/events/stream`. `None` closes the stream.
    pub token: Option<String>,
    /// Interval between keepalive comments
    pub keepalive: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            token: None,
            keepalive: Duration::from_secs(30),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub stream: Arc<StreamSettings>,
    pub proxy: ProxyTrust,
}

impl AppState {
    pub fn new(pipeline: Pipeline, stream: StreamSettings) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            stream: Arc::new(stream),
            proxy: ProxyTrust::default(),
        }
    }

    pub fn with_proxy_trust(mut self, proxy: ProxyTrust) -> Self {
        self.proxy = proxy;
        self
    }

    /// Start the rate limiter cleanup background task.
    /// Returns a handle that can be used to cancel the task.
    pub fn start_rate_limiter_cleanup(&self) -> tokio::task::JoinHandle<()> {
        start_rate_limiter_cleanup(self.pipeline.rate_limiter().clone(), RATE_LIMITER_SWEEP)
    }
}

impl FromRef<AppState> for ProxyTrust {
    fn from_ref(state: &AppState) -> Self {
        state.proxy
    }
}
