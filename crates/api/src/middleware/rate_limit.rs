//! Per-client admission control.
//!
//! Fixed windows approximate a sliding window: each key gets `requests`
//! admissions per `window`, counted from its first request. Precision at the
//! window edge is not a goal.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fixed-window rate limiter keyed by client.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, RateWindow>>,
    config: RateLimitConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Requests admitted per window
    pub requests: u32,
    /// Window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Check if a request is allowed for the given key.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock();

        match windows.get_mut(key) {
            Some(w) if now.saturating_duration_since(w.window_start) < self.config.window => {
                w.count = w.count.saturating_add(1);
                w.count <= self.config.requests
            }
            _ => {
                windows.insert(
                    key.to_string(),
                    RateWindow {
                        count: 1,
                        window_start: now,
                    },
                );
                true
            }
        }
    }

    /// Whole seconds until the key's current window ends, at least 1.
    pub fn retry_after(&self, key: &str) -> u64 {
        self.retry_after_at(key, Instant::now())
    }

    pub fn retry_after_at(&self, key: &str, now: Instant) -> u64 {
        let windows = self.windows.lock();
        let remaining = windows
            .get(key)
            .map(|w| {
                self.config
                    .window
                    .saturating_sub(now.saturating_duration_since(w.window_start))
            })
            .unwrap_or_default();
        remaining.as_secs_f64().ceil().max(1.0) as u64
    }

    /// Evict entries older than twice the window. Returns how many went.
    pub fn cleanup_stale(&self) -> usize {
        self.cleanup_stale_at(Instant::now())
    }

    pub fn cleanup_stale_at(&self, now: Instant) -> usize {
        let max_age = self.config.window * 2;
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| now.saturating_duration_since(w.window_start) < max_age);
        before - windows.len()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared rate limiter state.
pub type SharedRateLimiter = Arc<RateLimiter>;
