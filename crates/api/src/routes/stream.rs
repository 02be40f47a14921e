//! Live dashboard stream.
//!
//! `GET /events/stream` is a Server-Sent Events feed. It opens with
//! `{"type":"connected"}`, then carries one `{"type":"batch",...}` message per
//! committed request. Keepalive comments go out on a fixed interval whether
//! or not anything is published.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use beacon_core::BatchSummary;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::broadcast::Subscription;
use crate::state::AppState;

/// Messages sent on the stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamMessage {
    Connected,
    Batch(BatchSummary),
}

impl StreamMessage {
    fn to_sse(&self) -> Event {
        Event::default().json_data(self).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to encode stream message");
            Event::default().comment("encode error")
        })
    }
}

/// GET /events/stream
pub async fn stream_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = Subscription::new(state.pipeline.broadcaster().clone());
    debug!(subscriber = ?subscription.id(), "Stream opened");

    let connected = stream::once(async { Ok::<_, Infallible>(StreamMessage::Connected.to_sse()) });

    // The subscription lives inside the stream; when the client disconnects
    // axum drops the stream and the subscription unregisters itself.
    let updates = stream::unfold(subscription, |mut subscription| async move {
        let summary = subscription.recv().await?;
        Some((Ok::<_, Infallible>(StreamMessage::Batch(summary).to_sse()), subscription))
    });

    Sse::new(connected.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(state.stream.keepalive)
            .text("keepalive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_shapes() {
        let connected = serde_json::to_value(StreamMessage::Connected).unwrap();
        assert_eq!(connected, serde_json::json!({"type": "connected"}));

        let batch = serde_json::to_value(StreamMessage::Batch(BatchSummary {
            events: 3,
            performance: 1,
            errors: 0,
            timestamp: 1_700_000_000_000,
            last_event: None,
        }))
        .unwrap();
        assert_eq!(
            batch,
            serde_json::json!({
                "type": "batch",
                "events": 3,
                "performance": 1,
                "errors": 0,
                "timestamp": 1_700_000_000_000i64
            })
        );
    }
}
