//! SQLite health checks.

use std::time::{Duration, Instant};

use crate::client::SqliteStore;
use tracing::{debug, error};

/// Round-trip `SELECT 1`, returning the latency or the failure text.
pub async fn probe(store: &SqliteStore) -> Result<Duration, String> {
    let started = Instant::now();
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(store.pool())
        .await
        .map(|_| started.elapsed())
        .map_err(|e| e.to_string())
}

pub async fn check_connection(store: &SqliteStore) -> bool {
    probe(store).await.is_ok()
}

/// Run the probe and record the outcome in the global health registry.
pub async fn refresh_health(store: &SqliteStore) -> bool {
    let database = &telemetry::health().database;
    match probe(store).await {
        Ok(latency) => {
            debug!(latency_us = latency.as_micros() as u64, "Database probe passed");
            database.record_pass(latency);
            true
        }
        Err(e) => {
            error!(
                error = %e,
                failures = database.consecutive_failures() + 1,
                "Database probe failed"
            );
            database.record_failure(e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    #[tokio::test]
    async fn test_probe_open_and_closed_pool() {
        let store = SqliteStore::connect(&StoreConfig::in_memory()).await.unwrap();
        assert!(check_connection(&store).await);
        store.close().await;
        assert!(probe(&store).await.is_err());
    }
}
