//! Ingestion feature flags.
//!
//! Events are always collected. Performance and error collection can be
//! switched off per deployment; lines of a disabled kind are skipped.

use serde::{Deserialize, Serialize};

use crate::line::RecordKind;

/// A switchable collection feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Performance,
    Errors,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Errors => "errors",
        }
    }

    /// The feature gating a record kind, if any.
    pub fn for_kind(kind: RecordKind) -> Option<Self> {
        match kind {
            RecordKind::Event => None,
            RecordKind::Performance => Some(Self::Performance),
            RecordKind::Error => Some(Self::Errors),
        }
    }
}

/// Answers whether a feature is on. Implementations must be cheap to call
/// once per line.
pub trait FeatureGate: Send + Sync {
    fn is_enabled(&self, feature: Feature) -> bool;

    /// Whether lines of `kind` should be ingested.
    fn accepts(&self, kind: RecordKind) -> bool {
        Feature::for_kind(kind).map_or(true, |f| self.is_enabled(f))
    }
}

/// Static flags loaded from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    #[serde(default = "default_true")]
    pub performance: bool,
    #[serde(default = "default_true")]
    pub errors: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Features {
    fn default() -> Self {
        Self {
            performance: true,
            errors: true,
        }
    }
}

impl FeatureGate for Features {
    fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Performance => self.performance,
            Feature::Errors => self.errors,
        }
    }
}
