//! Read access to the site registry.

use async_trait::async_trait;
use beacon_core::{Result, Site};
use tracing::info;

use crate::client::{query_error, SqliteStore};

/// Lookup side of the registered-domain registry.
#[async_trait]
pub trait SiteRegistry: Send + Sync {
    /// Number of registered sites, active or not.
    async fn site_count(&self) -> Result<u64>;

    /// Site by its public identifier, regardless of `is_active`.
    async fn find_site(&self, site_id: &str) -> Result<Option<Site>>;
}

#[derive(sqlx::FromRow)]
struct SiteRow {
    id: i64,
    name: String,
    domain: String,
    site_id: String,
    is_active: bool,
}

impl From<SiteRow> for Site {
    fn from(row: SiteRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            domain: row.domain,
            site_id: row.site_id,
            is_active: row.is_active,
        }
    }
}

#[async_trait]
impl SiteRegistry for SqliteStore {
    async fn site_count(&self) -> Result<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sites")
            .fetch_one(self.pool())
            .await
            .map_err(query_error)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn find_site(&self, site_id: &str) -> Result<Option<Site>> {
        let row = sqlx::query_as::<_, SiteRow>(
            "SELECT id, name, domain, site_id, is_active FROM sites WHERE site_id = ?",
        )
        .bind(site_id)
        .fetch_optional(self.pool())
        .await
        .map_err(query_error)?;
        Ok(row.map(Site::from))
    }
}

impl SqliteStore {
    /// Insert or update a site keyed by `site_id`.
    pub async fn upsert_site(
        &self,
        name: &str,
        domain: &str,
        site_id: &str,
        is_active: bool,
    ) -> Result<Site> {
        let row = sqlx::query_as::<_, SiteRow>(
            r#"INSERT INTO sites (name, domain, site_id, is_active) VALUES (?, ?, ?, ?)
               ON CONFLICT (site_id) DO UPDATE SET
                   name = excluded.name,
                   domain = excluded.domain,
                   is_active = excluded.is_active
               RETURNING id, name, domain, site_id, is_active"#,
        )
        .bind(name)
        .bind(domain)
        .bind(site_id)
        .bind(is_active)
        .fetch_one(self.pool())
        .await
        .map_err(query_error)?;

        info!(site_id = %row.site_id, domain = %row.domain, active = row.is_active, "Upserted site");
        Ok(row.into())
    }
}
