//! Wire format of a single NDJSON line.
//!
//! Every field is optional and decoded leniently: a field that is present but
//! has the wrong JSON type reads as absent instead of failing the line. Only a
//! line that is not a JSON object at all is rejected.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::SkipReason;
use crate::limits::MAX_LINE_BYTES;
use crate::records::{BehaviorFlags, Utm};
use crate::scoring::ClientSignals;

/// Record kind selected by the `type` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Event,
    Performance,
    Error,
}

/// Decode a field, mapping a type mismatch to `None`.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// One tracker line. Unknown keys are ignored.
#[derive(Debug, Clone, Default)]
pub struct IncomingLine {
    pub kind: Option<String>,
    pub site_id: Option<String>,
    pub visitor_hash: Option<String>,

    // Page
    pub url: Option<String>,
    pub path: Option<String>,
    pub referrer: Option<String>,

    // Event
    /// `event_type`, or the older `event` key
    pub event_type: Option<String>,
    pub name: Option<String>,
    pub duration: Option<f64>,
    pub scroll_depth: Option<f64>,
    pub click_x: Option<f64>,
    pub click_y: Option<f64>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub props: Option<Map<String, Value>>,
    pub signals: Option<ClientSignals>,
    pub behavior: Option<WireBehavior>,

    // Performance
    pub lcp: Option<f64>,
    pub cls: Option<f64>,
    pub fcp: Option<f64>,
    pub ttfb: Option<f64>,
    pub inp: Option<f64>,
    pub page_load_time: Option<f64>,
    pub connection_type: Option<String>,

    // Error
    pub error_type: Option<String>,
    pub message: Option<String>,
    pub stack: Option<String>,
    pub script_url: Option<String>,
    /// `line`, or the browser's `lineno`
    pub line: Option<i64>,
    /// `col`, or the browser's `colno`
    pub col: Option<i64>,
    pub error_hash: Option<String>,
}

/// Remove `key` and decode it, mapping a type mismatch to `None`.
fn take<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Option<T> {
    fields
        .remove(key)
        .and_then(|value| serde_json::from_value(value).ok())
}

/// `key` if it decodes, else `alias`.
fn take_either<T: DeserializeOwned>(
    fields: &mut Map<String, Value>,
    key: &str,
    alias: &str,
) -> Option<T> {
    let primary = take(fields, key);
    let fallback = take(fields, alias);
    primary.or(fallback)
}

/// Interaction flags as sent by the tracker.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct WireBehavior {
    #[serde(default, deserialize_with = "lenient")]
    pub mouse_moved: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub scrolled: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub keyboard_used: Option<bool>,
}

impl From<WireBehavior> for BehaviorFlags {
    fn from(wire: WireBehavior) -> Self {
        Self {
            mouse_moved: wire.mouse_moved.unwrap_or(false),
            scrolled: wire.scrolled.unwrap_or(false),
            keyboard_used: wire.keyboard_used.unwrap_or(false),
        }
    }
}

impl IncomingLine {
    /// Decode one line. Blank lines are the caller's concern.
    ///
    /// The line is read as a plain JSON object first, so repeated keys keep
    /// the last value and a key sent alongside its alias never fails the line.
    pub fn parse(raw: &[u8]) -> Result<Self, SkipReason> {
        if raw.len() > MAX_LINE_BYTES {
            return Err(SkipReason::MalformedJson);
        }

        let fields: Map<String, Value> =
            serde_json::from_slice(raw).map_err(|_| SkipReason::MalformedJson)?;
        Ok(Self::from_fields(fields))
    }

    fn from_fields(mut f: Map<String, Value>) -> Self {
        Self {
            kind: take(&mut f, "type"),
            site_id: take(&mut f, "site_id"),
            visitor_hash: take(&mut f, "visitor_hash"),
            url: take(&mut f, "url"),
            path: take(&mut f, "path"),
            referrer: take(&mut f, "referrer"),
            event_type: take_either(&mut f, "event_type", "event"),
            name: take(&mut f, "name"),
            duration: take(&mut f, "duration"),
            scroll_depth: take(&mut f, "scroll_depth"),
            click_x: take(&mut f, "click_x"),
            click_y: take(&mut f, "click_y"),
            utm_source: take(&mut f, "utm_source"),
            utm_medium: take(&mut f, "utm_medium"),
            utm_campaign: take(&mut f, "utm_campaign"),
            utm_term: take(&mut f, "utm_term"),
            utm_content: take(&mut f, "utm_content"),
            props: take(&mut f, "props"),
            signals: take(&mut f, "signals"),
            behavior: take(&mut f, "behavior"),
            lcp: take(&mut f, "lcp"),
            cls: take(&mut f, "cls"),
            fcp: take(&mut f, "fcp"),
            ttfb: take(&mut f, "ttfb"),
            inp: take(&mut f, "inp"),
            page_load_time: take(&mut f, "page_load_time"),
            connection_type: take(&mut f, "connection_type"),
            error_type: take(&mut f, "error_type"),
            message: take(&mut f, "message"),
            stack: take(&mut f, "stack"),
            script_url: take(&mut f, "script_url"),
            line: take_either(&mut f, "line", "lineno"),
            col: take_either(&mut f, "col", "colno"),
            error_hash: take(&mut f, "error_hash"),
        }
    }

    /// Route by the `type` discriminator. Anything else is an event.
    pub fn kind(&self) -> RecordKind {
        match self.kind.as_deref() {
            Some("performance") => RecordKind::Performance,
            Some("error") => RecordKind::Error,
            _ => RecordKind::Event,
        }
    }

    pub fn utm(&self) -> Utm {
        Utm {
            source: self.utm_source.clone(),
            medium: self.utm_medium.clone(),
            campaign: self.utm_campaign.clone(),
            term: self.utm_term.clone(),
            content: self.utm_content.clone(),
        }
    }
}
