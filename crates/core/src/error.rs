//! Unified error types for the collector.
//!
//! Error codes:
//! - AUTH_001: Missing or invalid stream credentials
//! - VALID_001-002: Request body errors
//! - DB_001-002: Persistence errors
//! - RATE_001: Rate limit errors
//!
//! Per-line problems are not errors: they are [`SkipReason`]s and never
//! reach the client.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Request body error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    /// VALID_001: Body could not be read
    Unreadable,
    /// VALID_002: Body exceeds the size cap
    BodyTooLarge,
}

impl ValidationErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unreadable => "VALID_001",
            Self::BodyTooLarge => "VALID_002",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        400
    }
}

/// Database error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorCode {
    /// DB_001: Failed to store records
    StoreFailed,
    /// DB_002: Connection, schema or lookup failure
    QueryFailed,
}

impl DbErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::StoreFailed => "DB_001",
            Self::QueryFailed => "DB_002",
        }
    }

    pub fn http_status(&self) -> u16 {
        500
    }
}

/// Unified error type for the collector.
#[derive(Debug, Error)]
pub enum Error {
    /// Request body error with code.
    #[error("[{code}] {message}")]
    ValidationWithCode {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Database error with code.
    #[error("[{code}] {message}")]
    Database {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// Rate limit exceeded for a client key.
    #[error("[RATE_001] {message}")]
    RateLimit {
        message: String,
        retry_after: Option<u64>,
    },

    #[error("[AUTH_001] {0}")]
    Unauthorized(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a request body error with code.
    pub fn validation_code(code: ValidationErrorCode, msg: impl Into<String>) -> Self {
        Self::ValidationWithCode {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    /// Create a database error.
    pub fn database(code: DbErrorCode, msg: impl Into<String>) -> Self {
        Self::Database {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    pub fn rate_limit(msg: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self::RateLimit {
            message: msg.into(),
            retry_after,
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationWithCode { http_status, .. } => *http_status,
            Self::Database { http_status, .. } => *http_status,
            Self::RateLimit { .. } => 429,
            Self::Unauthorized(_) => 401,
            Self::Serialization(_) => 400,
            Self::Config(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::ValidationWithCode { code, .. } => Some(code),
            Self::Database { code, .. } => Some(code),
            Self::RateLimit { .. } => Some("RATE_001"),
            Self::Unauthorized(_) => Some("AUTH_001"),
            _ => None,
        }
    }
}

/// Why a single NDJSON line was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Line was not a JSON object
    MalformedJson,
    /// No site identifier and the registry is not empty
    MissingSite,
    /// Site identifier not registered
    UnknownSite,
    /// Site registered but deactivated
    InactiveSite,
    /// Request host does not match the registered domain
    OriginMismatch,
    /// Record kind not covered by the active license
    FeatureDisabled,
    /// Metric values out of range
    InvalidMetrics,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedJson => "malformed_json",
            Self::MissingSite => "missing_site",
            Self::UnknownSite => "unknown_site",
            Self::InactiveSite => "inactive_site",
            Self::OriginMismatch => "origin_mismatch",
            Self::FeatureDisabled => "feature_disabled",
            Self::InvalidMetrics => "invalid_metrics",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
