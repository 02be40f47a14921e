//! Process-local metrics.
//!
//! Counters and histograms live in memory and are logged periodically by
//! [`spawn_metrics_logger`]. There is no external metrics backend.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero.
    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }
}

/// Counters keyed by a static label, e.g. a skip reason.
#[derive(Debug, Default)]
pub struct LabeledCounter(Mutex<BTreeMap<&'static str, u64>>);

impl LabeledCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_by(&self, label: &'static str, n: u64) {
        if n == 0 {
            return;
        }
        *self.0.lock().entry(label).or_insert(0) += n;
    }

    pub fn get(&self, label: &str) -> u64 {
        self.0.lock().get(label).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.0
            .lock()
            .iter()
            .map(|(label, count)| (label.to_string(), *count))
            .collect()
    }
}

/// Latency histogram with fixed millisecond buckets.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s
    buckets: [AtomicU64; 10],
    overflow: AtomicU64,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 10] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            overflow: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        match Self::BUCKET_BOUNDS.iter().position(|&bound| ms <= bound) {
            Some(i) => self.buckets[i].fetch_add(1, Ordering::Relaxed),
            None => self.overflow.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn observe_duration(&self, elapsed: Duration) {
        self.observe(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Bucket upper bounds with their counts. Values above the last bound
    /// are reported under `u64::MAX`.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .chain(std::iter::once((u64::MAX, self.overflow.load(Ordering::Relaxed))))
            .collect()
    }
}

/// Collector metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    // Ingestion
    pub requests_received: Counter,
    pub requests_rejected: Counter,
    pub rate_limited_requests: Counter,
    pub lines_received: Counter,
    pub lines_skipped: Counter,
    pub lines_skipped_by_reason: LabeledCounter,
    pub events_accepted: Counter,
    pub performance_accepted: Counter,
    pub errors_accepted: Counter,
    pub bots_detected: Counter,

    // Store
    pub store_batches: Counter,
    pub store_insert_errors: Counter,

    // Live stream
    pub broadcasts: Counter,
    pub broadcast_dropped: Counter,
    pub active_subscribers: Gauge,

    // Latency histograms
    pub ingest_latency_ms: Histogram,
    pub store_latency_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            requests_received: self.requests_received.get(),
            requests_rejected: self.requests_rejected.get(),
            rate_limited_requests: self.rate_limited_requests.get(),
            lines_received: self.lines_received.get(),
            lines_skipped: self.lines_skipped.get(),
            skipped_by_reason: self.lines_skipped_by_reason.snapshot(),
            events_accepted: self.events_accepted.get(),
            performance_accepted: self.performance_accepted.get(),
            errors_accepted: self.errors_accepted.get(),
            bots_detected: self.bots_detected.get(),
            store_batches: self.store_batches.get(),
            store_insert_errors: self.store_insert_errors.get(),
            broadcasts: self.broadcasts.get(),
            broadcast_dropped: self.broadcast_dropped.get(),
            active_subscribers: self.active_subscribers.get(),
            ingest_latency_mean_ms: self.ingest_latency_ms.mean(),
            store_latency_mean_ms: self.store_latency_ms.mean(),
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub requests_received: u64,
    pub requests_rejected: u64,
    pub rate_limited_requests: u64,
    pub lines_received: u64,
    pub lines_skipped: u64,
    pub skipped_by_reason: BTreeMap<String, u64>,
    pub events_accepted: u64,
    pub performance_accepted: u64,
    pub errors_accepted: u64,
    pub bots_detected: u64,
    pub store_batches: u64,
    pub store_insert_errors: u64,
    pub broadcasts: u64,
    pub broadcast_dropped: u64,
    pub active_subscribers: u64,
    pub ingest_latency_mean_ms: f64,
    pub store_latency_mean_ms: f64,
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}

/// Log a metrics snapshot every `period`.
pub fn spawn_metrics_logger(period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let s = metrics().snapshot();
            tracing::info!(
                requests = s.requests_received,
                rate_limited = s.rate_limited_requests,
                lines = s.lines_received,
                skipped = s.lines_skipped,
                skipped_by_reason = ?s.skipped_by_reason,
                events = s.events_accepted,
                performance = s.performance_accepted,
                errors = s.errors_accepted,
                bots = s.bots_detected,
                store_errors = s.store_insert_errors,
                dropped_broadcasts = s.broadcast_dropped,
                subscribers = s.active_subscribers,
                ingest_mean_ms = s.ingest_latency_mean_ms,
                store_mean_ms = s.store_latency_mean_ms,
                "Collector metrics"
            );
        }
    })
}
