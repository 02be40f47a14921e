//! Probe-driven health state.
//!
//! The collector has one hard dependency, the SQLite database. A background
//! probe records each outcome here and the HTTP health routes read it back.

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Outcome of the most recent probe against one dependency.
///
/// Unhealthy until a probe has passed.
#[derive(Debug)]
pub struct ProbeState {
    name: &'static str,
    passing: AtomicBool,
    /// Epoch millis of the last probe, 0 before the first
    checked_at: AtomicI64,
    latency_us: AtomicU64,
    consecutive_failures: AtomicU64,
    last_error: RwLock<Option<String>>,
}

impl ProbeState {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            passing: AtomicBool::new(false),
            checked_at: AtomicI64::new(0),
            latency_us: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
            last_error: RwLock::new(None),
        }
    }

    pub fn record_pass(&self, latency: Duration) {
        self.latency_us
            .store(latency.as_micros().min(u64::MAX as u128) as u64, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *self.last_error.write() = None;
        self.checked_at.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        self.passing.store(true, Ordering::Release);
    }

    pub fn record_failure(&self, reason: impl Into<String>) {
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        *self.last_error.write() = Some(reason.into());
        self.checked_at.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        self.passing.store(false, Ordering::Release);
    }

    pub fn is_passing(&self) -> bool {
        self.passing.load(Ordering::Acquire)
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    fn report(&self) -> ComponentHealthReport {
        let checked_at = self.checked_at.load(Ordering::Relaxed);
        let passing = self.is_passing();
        ComponentHealthReport {
            name: self.name.to_string(),
            healthy: passing,
            message: self.last_error.read().clone(),
            checked_at: (checked_at > 0).then_some(checked_at),
            latency_ms: passing
                .then(|| self.latency_us.load(Ordering::Relaxed) as f64 / 1000.0),
            consecutive_failures: self.consecutive_failures(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealthReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealthReport {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Epoch millis of the last probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    pub consecutive_failures: u64,
}

pub struct HealthRegistry {
    pub database: ProbeState,
}

impl HealthRegistry {
    pub const fn new() -> Self {
        Self {
            database: ProbeState::new("database"),
        }
    }

    pub fn report(&self) -> HealthReport {
        let database = self.database.report();
        let status = if database.healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        HealthReport {
            status,
            components: vec![database],
        }
    }

    /// Traffic is only useful when batches can be committed.
    pub fn is_ready(&self) -> bool {
        self.database.is_passing()
    }

    /// The process answers HTTP, which is all liveness asks.
    pub fn is_alive(&self) -> bool {
        true
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub static HEALTH: std::sync::LazyLock<HealthRegistry> =
    std::sync::LazyLock::new(HealthRegistry::new);

pub fn health() -> &'static HealthRegistry {
    &HEALTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unprobed_database_is_not_ready() {
        let registry = HealthRegistry::new();
        assert!(!registry.is_ready());
        assert!(registry.is_alive());

        let report = registry.report();
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.components[0].checked_at, None);
    }

    #[test]
    fn test_probe_outcomes() {
        let registry = HealthRegistry::new();

        registry.database.record_failure("disk I/O error");
        registry.database.record_failure("disk I/O error");
        let report = registry.report();
        assert_eq!(report.components[0].consecutive_failures, 2);
        assert_eq!(report.components[0].message.as_deref(), Some("disk I/O error"));
        assert!(report.components[0].checked_at.is_some());
        assert!(report.components[0].latency_ms.is_none());

        registry.database.record_pass(Duration::from_micros(1500));
        let report = registry.report();
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.components[0].consecutive_failures, 0);
        assert_eq!(report.components[0].message, None);
        assert_eq!(report.components[0].latency_ms, Some(1.5));
    }
}
