//! Per-line site authorization.
//!
//! A line names its site by `site_id`. The request's Origin (or Referer) host
//! must belong to that site's registered domain. With an empty registry the
//! collector runs in bootstrap mode and lines without a site are admitted.

use std::sync::Arc;
use std::time::Duration;

use beacon_core::host::{host_matches, is_local_host};
use beacon_core::{Result, Site, SkipReason};
use moka::future::Cache;
use sqlite_store::SiteRegistry;
use tracing::debug;

/// Cache TTL for site lookups (30 seconds).
const SITE_CACHE_TTL: Duration = Duration::from_secs(30);

/// Maximum cached site lookups, hits and misses together.
const SITE_CACHE_MAX_CAPACITY: u64 = 10_000;

/// Which site an admitted line is recorded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmittedSite {
    Registered(Site),
    /// Zero-site mode. Carries the domain to record under.
    Bootstrap(String),
}

impl AdmittedSite {
    pub fn domain(&self) -> &str {
        match self {
            Self::Registered(site) => &site.domain,
            Self::Bootstrap(domain) => domain,
        }
    }
}

/// Outcome for one line.
pub type Decision = std::result::Result<AdmittedSite, SkipReason>;

/// Validates site identifiers and request origins against the registry.
#[derive(Clone)]
pub struct SiteAuthorizer {
    registry: Arc<dyn SiteRegistry>,
    /// site_id -> site, `None` for identifiers that are not registered
    cache: Cache<String, Option<Site>>,
}

impl SiteAuthorizer {
    pub fn new(registry: Arc<dyn SiteRegistry>) -> Self {
        Self::with_ttl(registry, SITE_CACHE_TTL)
    }

    pub fn with_ttl(registry: Arc<dyn SiteRegistry>, ttl: Duration) -> Self {
        Self {
            registry,
            cache: Cache::builder()
                .max_capacity(SITE_CACHE_MAX_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Whether the registry is empty. Computed once per request.
    pub async fn bootstrap_mode(&self) -> Result<bool> {
        Ok(self.registry.site_count().await? == 0)
    }

    /// Decide one line.
    ///
    /// `request_host` is the normalized Origin/Referer host, if any. Registry
    /// failures are errors, not skips.
    pub async fn authorize(
        &self,
        site_id: Option<&str>,
        request_host: Option<&str>,
        bootstrap: bool,
    ) -> Result<Decision> {
        let site_id = match site_id.map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ if bootstrap => {
                let domain = request_host.unwrap_or("unknown").to_string();
                return Ok(Ok(AdmittedSite::Bootstrap(domain)));
            }
            _ => return Ok(Err(SkipReason::MissingSite)),
        };

        let Some(site) = self.lookup(site_id).await? else {
            return Ok(Err(SkipReason::UnknownSite));
        };
        if !site.is_active {
            return Ok(Err(SkipReason::InactiveSite));
        }

        match request_host {
            None => {}
            Some(host) if host_matches(host, &site.domain) || is_local_host(host) => {}
            Some(host) => {
                debug!(site_id = %site.site_id, host = %host, "Origin does not match site domain");
                return Ok(Err(SkipReason::OriginMismatch));
            }
        }

        Ok(Ok(AdmittedSite::Registered(site)))
    }

    async fn lookup(&self, site_id: &str) -> Result<Option<Site>> {
        if let Some(cached) = self.cache.get(site_id).await {
            return Ok(cached);
        }

        let site = self.registry.find_site(site_id).await?;
        self.cache.insert(site_id.to_string(), site.clone()).await;
        Ok(site)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct StaticRegistry {
        sites: Vec<Site>,
        lookups: Mutex<usize>,
    }

    #[async_trait]
    impl SiteRegistry for StaticRegistry {
        async fn site_count(&self) -> Result<u64> {
            Ok(self.sites.len() as u64)
        }

        async fn find_site(&self, site_id: &str) -> Result<Option<Site>> {
            *self.lookups.lock() += 1;
            Ok(self.sites.iter().find(|s| s.site_id == site_id).cloned())
        }
    }

    fn site(site_id: &str, domain: &str, is_active: bool) -> Site {
        Site {
            id: 1,
            name: "test".into(),
            domain: domain.into(),
            site_id: site_id.into(),
            is_active,
        }
    }

    fn authorizer(sites: Vec<Site>) -> (SiteAuthorizer, Arc<StaticRegistry>) {
        let registry = Arc::new(StaticRegistry {
            sites,
            ..Default::default()
        });
        (SiteAuthorizer::new(registry.clone()), registry)
    }

    #[tokio::test]
    async fn test_bootstrap_admits_lines_without_site() {
        let (auth, _) = authorizer(vec![]);
        assert!(auth.bootstrap_mode().await.unwrap());

        let decision = auth.authorize(None, Some("example.com"), true).await.unwrap();
        assert_eq!(decision, Ok(AdmittedSite::Bootstrap("example.com".into())));

        let decision = auth.authorize(None, None, true).await.unwrap();
        assert_eq!(decision.unwrap().domain(), "unknown");
    }

    #[tokio::test]
    async fn test_missing_site_rejected_once_registry_has_sites() {
        let (auth, _) = authorizer(vec![site("abc", "example.com", true)]);
        assert!(!auth.bootstrap_mode().await.unwrap());
        let decision = auth.authorize(None, Some("example.com"), false).await.unwrap();
        assert_eq!(decision, Err(SkipReason::MissingSite));
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_sites_rejected() {
        let (auth, _) = authorizer(vec![site("off", "example.com", false)]);
        assert_eq!(
            auth.authorize(Some("nope"), None, false).await.unwrap(),
            Err(SkipReason::UnknownSite)
        );
        assert_eq!(
            auth.authorize(Some("off"), Some("example.com"), false).await.unwrap(),
            Err(SkipReason::InactiveSite)
        );
    }

    #[tokio::test]
    async fn test_origin_checks() {
        let (auth, _) = authorizer(vec![site("abc", "www.example.com", true)]);

        for host in ["example.com", "www.example.com", "localhost", "127.0.0.1"] {
            let decision = auth.authorize(Some("abc"), Some(host), false).await.unwrap();
            assert!(decision.is_ok(), "{} should be admitted", host);
        }

        for host in ["evil.io", "shop.example.com", "example.com.evil.io"] {
            assert_eq!(
                auth.authorize(Some("abc"), Some(host), false).await.unwrap(),
                Err(SkipReason::OriginMismatch),
                "{} should be rejected",
                host
            );
        }

        // No Origin or Referer at all.
        assert!(auth.authorize(Some("abc"), None, false).await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_lookups_are_cached() {
        let (auth, registry) = authorizer(vec![site("abc", "example.com", true)]);
        for _ in 0..5 {
            auth.authorize(Some("abc"), None, false).await.unwrap().unwrap();
            auth.authorize(Some("missing"), None, false).await.unwrap().unwrap_err();
        }
        assert_eq!(*registry.lookups.lock(), 2);
    }
}
