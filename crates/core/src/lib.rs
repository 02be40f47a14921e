//! Core types, wire decoding, bot scoring and identity for the Beacon collector.

pub mod enrichment;
pub mod error;
pub mod features;
pub mod host;
pub mod identity;
pub mod limits;
pub mod line;
pub mod records;
pub mod scoring;

pub use enrichment::{DatacenterRanges, Enricher, Enrichment, GeoLookup, NoGeoLookup, UserAgentParser};
pub use error::{Error, Result, SkipReason};
pub use features::{Feature, FeatureGate, Features};
pub use identity::IdentityGenerator;
pub use line::{IncomingLine, RecordKind};
pub use records::*;
pub use scoring::{BotVerdict, ClientSignals, ScoreInput};
