//! API routes.

pub mod health;
pub mod ingest;
pub mod stream;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::auth::require_stream_token;
use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    // The tracker posts cross-origin from every registered site.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let stream = Router::new()
        .route("/events/stream", get(stream::stream_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_stream_token,
        ));

    Router::new()
        .route("/i", post(ingest::ingest_handler))
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .layer(CompressionLayer::new())
        .merge(stream)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
