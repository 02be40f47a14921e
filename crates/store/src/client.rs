//! SQLite pool wrapper.

use std::str::FromStr;
use std::time::Duration;

use beacon_core::error::DbErrorCode;
use beacon_core::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::StoreConfig;
use crate::schema::{all_statements, Table};

/// SQLite-backed store for records and the site registry.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the pool and create the schema.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(query_error)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));
        if !config.is_in_memory() {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections.max(1));
        if config.is_in_memory() {
            // Every new connection would get a fresh empty database.
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await.map_err(query_error)?;
        let store = Self { pool };
        store.init_schema().await?;

        info!(
            url = %config.url,
            max_connections = config.max_connections,
            "Opened SQLite store"
        );

        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes if missing.
    pub async fn init_schema(&self) -> Result<()> {
        for ddl in all_statements() {
            sqlx::query(ddl).execute(&self.pool).await.map_err(query_error)?;
        }
        Ok(())
    }

    /// Row count of a record table.
    pub async fn count(&self, table: Table) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.as_str());
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(query_error)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

pub(crate) fn query_error(e: sqlx::Error) -> Error {
    Error::database(DbErrorCode::QueryFailed, e.to_string())
}

pub(crate) fn store_error(e: sqlx::Error) -> Error {
    Error::database(DbErrorCode::StoreFailed, e.to_string())
}
