//! Mock implementations for testing.

use async_trait::async_trait;
use beacon_core::error::DbErrorCode;
use beacon_core::{Error, RecordBatch, Result};
use parking_lot::Mutex;
use sqlite_store::RecordStore;
use std::sync::Arc;

/// Record store that rejects every batch.
///
/// Implements the same `RecordStore` trait as `SqliteStore`, so the full
/// request path runs up to the commit.
#[derive(Clone, Default)]
pub struct FailingStore {
    attempts: Arc<Mutex<usize>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches the pipeline tried to write.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn insert_batch(&self, _batch: &RecordBatch) -> Result<()> {
        *self.attempts.lock() += 1;
        Err(Error::database(
            DbErrorCode::StoreFailed,
            "disk I/O error",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failing_store_counts_attempts() {
        let store = FailingStore::new();
        let err = store.insert_batch(&RecordBatch::default()).await.unwrap_err();
        assert_eq!(err.error_code(), Some("DB_001"));
        assert_eq!(store.attempts(), 1);
    }
}
