//! Structured logging via `tracing-subscriber`.

use std::str::FromStr;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Collector at info; sqlx logs every statement at info, so it is held to warn.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    /// One JSON object per line with file and line number
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" | "" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// `EnvFilter` directives, e.g. "info,api=debug"
    pub filter: String,
    pub format: LogFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
        }
    }
}

impl TracingConfig {
    /// Read `RUST_LOG` and `LOG_FORMAT`. `LOG_JSON=1|true` is accepted as a
    /// shorthand for `LOG_FORMAT=json`.
    pub fn from_env() -> Self {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
        let format = resolve_format(
            std::env::var("LOG_FORMAT").ok().as_deref(),
            std::env::var("LOG_JSON").ok().as_deref(),
        );
        Self { filter, format }
    }
}

fn resolve_format(log_format: Option<&str>, log_json: Option<&str>) -> LogFormat {
    if let Some(format) = log_format.and_then(|f| f.parse().ok()) {
        return format;
    }
    match log_json {
        Some(v) if v == "1" || v.eq_ignore_ascii_case("true") => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_tracing(config: TracingConfig) {
    let env_filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    if result.is_ok() {
        tracing::info!(filter = %config.filter, format = ?config.format, "Logging initialized");
    }
}

pub fn init_tracing_from_env() {
    init_tracing(TracingConfig::from_env());
}
