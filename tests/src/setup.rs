//! Common test setup functions.

use std::sync::Arc;
use std::time::Duration;

use api::middleware::rate_limit::RateLimitConfig;
use api::{router, AppState, Pipeline, StreamSettings};
use axum::Router;
use axum_test::TestServer;
use sqlite_store::health::refresh_health;
use sqlite_store::{RecordStore, SqliteStore, StoreConfig, Table};

use crate::fixtures::{SITE_DOMAIN, SITE_ID};

/// Test context with an in-memory SQLite store and the real router.
///
/// The registry is always the SQLite store; the record store can be swapped
/// for a mock to exercise failure paths.
pub struct TestContext {
    pub store: Arc<SqliteStore>,
    pub pipeline: Arc<Pipeline>,
    pub router: Router,
}

/// Knobs for building a [`TestContext`].
pub struct TestOptions {
    pub records: Option<Arc<dyn RecordStore>>,
    pub rate_limit: u32,
    pub seed_site: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            records: None,
            rate_limit: 100,
            seed_site: true,
        }
    }
}

impl TestContext {
    /// Context with the default site seeded.
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        let store = Arc::new(
            SqliteStore::connect(&StoreConfig::in_memory())
                .await
                .expect("Failed to open in-memory store"),
        );
        refresh_health(&store).await;

        if options.seed_site {
            store
                .upsert_site("Example", SITE_DOMAIN, SITE_ID, true)
                .await
                .expect("Failed to seed site");
        }

        let records: Arc<dyn RecordStore> = match options.records {
            Some(records) => records,
            None => store.clone(),
        };

        let pipeline = Pipeline::new(records, store.clone()).with_rate_limit(RateLimitConfig {
            requests: options.rate_limit,
            window: Duration::from_secs(60),
        });
        let state = AppState::new(pipeline, StreamSettings::default());
        let pipeline = state.pipeline.clone();

        Self {
            store,
            pipeline,
            router: router(state),
        }
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(self.router.clone()).expect("Failed to create test server")
    }

    pub async fn count(&self, table: Table) -> i64 {
        self.store.count(table).await.expect("Count query failed")
    }
}
