//! Beacon collector
//!
//! Cookie-free web analytics ingestion:
//! - NDJSON batch ingestion with per-line site authorization
//! - Session/visitor hashing without cookies
//! - Multi-signal bot scoring
//! - Transactional SQLite persistence
//! - Live dashboard fan-out over Server-Sent Events

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::signal;
use tracing::{error, info, warn};
use validator::Validate;

use api::middleware::rate_limit::RateLimitConfig;
use api::{router, AppState, Pipeline, ProxyTrust, StreamSettings};
use beacon_core::enrichment::{DatacenterRanges, Enricher, NoGeoLookup, DEFAULT_DATACENTER_RANGES};
use beacon_core::{Features, IdentityGenerator};
use sqlite_store::{health::refresh_health, SqliteStore, StoreConfig};
use telemetry::{init_tracing_from_env, spawn_metrics_logger};

/// How often collector metrics are logged.
const METRICS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// How often the database probe refreshes the health registry.
const HEALTH_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    /// Take the client IP from `X-Forwarded-For` / `X-Real-IP`. Only safe
    /// behind a proxy that overwrites them; otherwise set false.
    #[serde(default = "default_true")]
    trust_proxy_headers: bool,

    #[serde(default)]
    database: StoreConfig,

    #[serde(default)]
    #[validate(nested)]
    rate_limit: RateLimitSection,

    #[serde(default)]
    #[validate(nested)]
    session: SessionSection,

    #[serde(default)]
    features: Features,

    #[serde(default)]
    #[validate(nested)]
    stream: StreamSection,

    /// CIDR ranges counted as datacenter source IPs
    #[serde(default = "default_datacenter_ranges")]
    datacenter_ranges: Vec<String>,

    /// Sites seeded into the registry at startup
    #[serde(default)]
    sites: Vec<SeedSite>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct RateLimitSection {
    #[validate(range(min = 1))]
    requests: u32,
    #[validate(range(min = 1))]
    window_secs: u64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            requests: 100,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct SessionSection {
    #[validate(range(min = 1))]
    timeout_minutes: u32,
    /// Session hash salt. Random per process when unset.
    salt: Option<String>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            timeout_minutes: beacon_core::identity::SESSION_TIMEOUT_MINUTES,
            salt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct StreamSection {
    /// Bearer token for the live stream. The stream is closed when unset.
    token: Option<String>,
    #[validate(range(min = 1))]
    buffer: usize,
    #[validate(range(min = 1))]
    keepalive_secs: u64,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            token: None,
            buffer: api::pipeline::DEFAULT_STREAM_BUFFER,
            keepalive_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SeedSite {
    name: String,
    domain: String,
    site_id: String,
    #[serde(default = "default_true")]
    is_active: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_datacenter_ranges() -> Vec<String> {
    DEFAULT_DATACENTER_RANGES.iter().map(|s| s.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            trust_proxy_headers: true,
            database: StoreConfig::default(),
            rate_limit: RateLimitSection::default(),
            session: SessionSection::default(),
            features: Features::default(),
            stream: StreamSection::default(),
            datacenter_ranges: default_datacenter_ranges(),
            sites: Vec::new(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Beacon collector v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    let store = Arc::new(
        SqliteStore::connect(&config.database)
            .await
            .context("Failed to open SQLite store")?,
    );

    if refresh_health(&store).await {
        info!("Database connection: healthy");
    } else {
        error!("Database connection: unhealthy");
    }

    seed_sites(&store, &config.sites).await?;

    let datacenters = DatacenterRanges::parse(&config.datacenter_ranges)
        .context("Invalid datacenter_ranges")?;
    info!(ranges = datacenters.len(), "Loaded datacenter ranges");

    let salt = match config.session.salt.clone() {
        Some(salt) => salt,
        None => {
            info!("No session salt configured, using a random per-process salt");
            uuid::Uuid::new_v4().simple().to_string()
        }
    };

    let pipeline = Pipeline::new(store.clone(), store.clone())
        .with_identity(IdentityGenerator::new(salt, config.session.timeout_minutes))
        .with_enricher(Enricher::new(Arc::new(NoGeoLookup), datacenters))
        .with_features(Arc::new(config.features))
        .with_rate_limit(RateLimitConfig {
            requests: config.rate_limit.requests,
            window: Duration::from_secs(config.rate_limit.window_secs),
        })
        .with_stream_buffer(config.stream.buffer);

    if config.stream.token.is_none() {
        warn!("No stream token configured, /events/stream is disabled");
    }

    let state = AppState::new(
        pipeline,
        StreamSettings {
            token: config.stream.token.clone(),
            keepalive: Duration::from_secs(config.stream.keepalive_secs),
        },
    )
    .with_proxy_trust(ProxyTrust(config.trust_proxy_headers));

    if !config.trust_proxy_headers {
        info!("Proxy headers ignored, rate limiting keys on the socket peer");
    }

    let rate_limiter_cleanup = state.start_rate_limiter_cleanup();
    info!("Started rate limiter cleanup task (every 5 minutes)");

    let metrics_logger = spawn_metrics_logger(METRICS_LOG_INTERVAL);
    let health_probe = spawn_health_probe(store.clone());

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // ConnectInfo gives ClientIp the socket peer when proxy headers are absent or untrusted.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Shutting down...");

    rate_limiter_cleanup.abort();
    metrics_logger.abort();
    health_probe.abort();
    store.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables, e.g. BEACON__STREAM__TOKEN
        .add_source(
            config::Environment::with_prefix("BEACON")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    config.validate().context("Invalid configuration")?;

    Ok(config)
}

/// Upsert configured sites into the registry.
async fn seed_sites(store: &SqliteStore, sites: &[SeedSite]) -> Result<()> {
    for site in sites {
        store
            .upsert_site(&site.name, &site.domain, &site.site_id, site.is_active)
            .await
            .with_context(|| format!("Failed to seed site {}", site.site_id))?;
    }
    if !sites.is_empty() {
        info!(count = sites.len(), "Seeded sites");
    }
    Ok(())
}

/// Refresh database health periodically.
fn spawn_health_probe(store: Arc<SqliteStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEALTH_PROBE_INTERVAL);
        loop {
            interval.tick().await;
            if !refresh_health(&store).await {
                warn!("Database health probe failed");
            }
        }
    })
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
