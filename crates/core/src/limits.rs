//! Size limits for the collector.
//!
//! MEMORY SAFETY: these bound what a single hostile request can make the
//! server allocate or store.
//!
//! The `#[validate]` derive requires literal values in attributes, so the
//! metric bounds are repeated on `PerformanceSample`; a records test checks
//! that each literal equals the constant here.

// === Request Limits ===

/// Maximum request body size in bytes (1MB).
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Maximum single NDJSON line size in bytes (64KB).
///
/// Longer lines are skipped without being decoded.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

// === Field Limits (chars) ===

/// URL, referrer and script URL max length.
pub const MAX_URL_LEN: usize = 2048;

/// Path max length.
pub const MAX_PATH_LEN: usize = 2000;

/// Error message max length.
pub const MAX_ERROR_MESSAGE_LEN: usize = 2048;

/// Stack trace max length (16KB).
pub const MAX_STACK_LEN: usize = 16 * 1024;

/// UTM parameter and short label max length.
pub const MAX_LABEL_LEN: usize = 256;

/// Freeform props max serialized size (16KB). Larger props are dropped.
pub const MAX_PROPS_BYTES: usize = 16 * 1024;

// === Performance Metric Bounds ===

/// LCP / FCP / TTFB max in milliseconds (60 seconds).
pub const MAX_PAINT_MS: f64 = 60_000.0;

/// INP max in milliseconds (10 seconds).
pub const MAX_INP_MS: f64 = 10_000.0;

/// CLS max value (Google considers >0.25 poor, 10 is extreme).
pub const MAX_CLS: f64 = 10.0;

/// Page load max in milliseconds (5 minutes).
pub const MAX_PAGE_LOAD_MS: f64 = 300_000.0;

/// Truncate a string to at most `max` chars, respecting char boundaries.
pub fn truncate(mut value: String, max: usize) -> String {
    if let Some((idx, _)) = value.char_indices().nth(max) {
        value.truncate(idx);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("héllo".into(), 2), "hé");
        assert_eq!(truncate("short".into(), 64), "short");
        assert_eq!(truncate(String::new(), 0), "");
    }
}
