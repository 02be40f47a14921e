//! Persisted record types.
//!
//! Records are built once per accepted NDJSON line and never mutated after
//! they are handed to the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Interaction event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Pageview,
    Engagement,
    Scroll,
    Click,
    Custom,
}

impl EventType {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pageview => "pageview",
            Self::Engagement => "engagement",
            Self::Scroll => "scroll",
            Self::Click => "click",
            Self::Custom => "custom",
        }
    }

    /// Map a client-supplied name to an event type.
    ///
    /// Absent means pageview. Unrecognised names are kept as custom events.
    pub fn from_client(name: Option<&str>) -> Self {
        match name {
            None | Some("") | Some("pageview") => Self::Pageview,
            Some("engagement") => Self::Engagement,
            Some("scroll") => Self::Scroll,
            Some("click") => Self::Click,
            Some(_) => Self::Custom,
        }
    }
}

/// Traffic classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotCategory {
    Human,
    GoodBot,
    Suspicious,
    BadBot,
}

impl BotCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::GoodBot => "good_bot",
            Self::Suspicious => "suspicious",
            Self::BadBot => "bad_bot",
        }
    }
}

/// One piece of bot evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSignal {
    pub name: String,
    pub weight: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl BotSignal {
    pub fn new(name: impl Into<String>, weight: u32) -> Self {
        Self {
            name: name.into(),
            weight,
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Location resolved from the client IP.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Parsed user agent details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub device: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            browser: "unknown".into(),
            browser_version: "unknown".into(),
            os: "unknown".into(),
            device: "unknown".into(),
        }
    }
}

/// UTM campaign parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utm {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
    pub term: Option<String>,
    pub content: Option<String>,
}

/// Client-reported interaction flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorFlags {
    pub mouse_moved: bool,
    pub scrolled: bool,
    pub keyboard_used: bool,
}

/// Fields shared by every record kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordContext {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub visitor_hash: String,
    pub domain: String,
    pub url: String,
    pub path: String,
}

/// An interaction event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub event_type: EventType,
    #[serde(flatten)]
    pub context: RecordContext,
    pub geo: GeoLocation,
    pub client: ClientInfo,

    pub is_bot: bool,
    pub bot_score: u8,
    pub bot_category: BotCategory,
    pub bot_signals: Vec<BotSignal>,
    pub behavior: BehaviorFlags,

    pub click_x: Option<f64>,
    pub click_y: Option<f64>,
    pub scroll_depth: Option<f64>,
    /// Time on page in milliseconds
    pub duration: Option<i64>,
    pub referrer: Option<String>,
    pub utm: Utm,
    /// Custom event name, only for `custom` events
    pub name: Option<String>,
    /// Freeform JSON object serialized as a string
    pub props: Option<String>,
}

impl Event {
    /// Serialized signal list as stored in the `bot_signals` column.
    pub fn bot_signals_json(&self) -> String {
        serde_json::to_string(&self.bot_signals).unwrap_or_else(|_| "[]".into())
    }
}

/// Web vitals captured on page unload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PerformanceSample {
    pub id: Uuid,
    #[serde(flatten)]
    pub context: RecordContext,
    /// Largest Contentful Paint (ms)
    #[validate(range(min = 0.0, max = 60000.0))]
    pub lcp: Option<f64>,
    /// Cumulative Layout Shift
    #[validate(range(min = 0.0, max = 10.0))]
    pub cls: Option<f64>,
    /// First Contentful Paint (ms)
    #[validate(range(min = 0.0, max = 60000.0))]
    pub fcp: Option<f64>,
    /// Time to First Byte (ms)
    #[validate(range(min = 0.0, max = 60000.0))]
    pub ttfb: Option<f64>,
    /// Interaction to Next Paint (ms)
    #[validate(range(min = 0.0, max = 10000.0))]
    pub inp: Option<f64>,
    /// Full page load (ms)
    #[validate(range(min = 0.0, max = 300000.0))]
    pub page_load_time: Option<f64>,
    pub connection_type: Option<String>,
}

/// A client-side JavaScript error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub context: RecordContext,
    pub error_type: String,
    pub message: String,
    pub stack: Option<String>,
    pub script_url: Option<String>,
    pub line: Option<i64>,
    pub col: Option<i64>,
    /// Client-side content fingerprint; repeated hashes are expected.
    pub error_hash: Option<String>,
}

/// A registered tracking target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub name: String,
    pub domain: String,
    pub site_id: String,
    pub is_active: bool,
}

/// Everything one request produced, written in one transaction.
#[derive(Debug, Clone, Default)]
pub struct RecordBatch {
    pub events: Vec<Event>,
    pub performance: Vec<PerformanceSample>,
    pub errors: Vec<ErrorRecord>,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.performance.is_empty() && self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len() + self.performance.len() + self.errors.len()
    }

    /// Build the live-dashboard summary for this batch.
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            events: self.events.len(),
            performance: self.performance.len(),
            errors: self.errors.len(),
            timestamp: Utc::now().timestamp_millis(),
            last_event: self.events.last().map(EventSample::from),
        }
    }
}

/// Aggregate pushed to live dashboard viewers. Never carries raw records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub events: usize,
    pub performance: usize,
    pub errors: usize,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event: Option<EventSample>,
}

/// The handful of event fields a dashboard needs for its live ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSample {
    pub event_type: EventType,
    pub domain: String,
    pub path: String,
    pub country: Option<String>,
    pub browser: String,
    pub device: String,
    pub bot_category: BotCategory,
}

impl From<&Event> for EventSample {
    fn from(event: &Event) -> Self {
        Self {
            event_type: event.event_type,
            domain: event.context.domain.clone(),
            path: event.context.path.clone(),
            country: event.geo.country.clone(),
            browser: event.client.browser.clone(),
            device: event.client.device.clone(),
            bot_category: event.bot_category,
        }
    }
}
