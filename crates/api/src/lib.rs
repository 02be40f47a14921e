//! HTTP API layer for the collector.

pub mod authorize;
pub mod broadcast;
pub mod extractors;
pub mod middleware;
pub mod pipeline;
pub mod response;
pub mod routes;
pub mod state;

pub use pipeline::{IngestCounts, IngestRequest, Pipeline};
pub use routes::router;
pub use extractors::ProxyTrust;
pub use state::{AppState, StreamSettings};
