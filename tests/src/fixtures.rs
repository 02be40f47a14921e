//! Tracker payload fixtures.

/// Site seeded into every test registry.
pub const SITE_ID: &str = "site-abc";
pub const SITE_DOMAIN: &str = "example.com";
pub const ORIGIN: &str = "https://example.com";

pub const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const GOOGLEBOT_UA: &str =
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

/// Pageview line for the seeded site.
pub fn pageview(path: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "event",
        "site_id": SITE_ID,
        "event_type": "pageview",
        "url": format!("https://example.com{}", path),
        "path": path,
        "behavior": { "mouse_moved": true, "scrolled": true, "keyboard_used": false }
    })
}

/// Custom event line with props.
pub fn custom_event(name: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "event",
        "site_id": SITE_ID,
        "event_type": "custom",
        "name": name,
        "url": "https://example.com/pricing",
        "props": { "plan": "pro" }
    })
}

/// Web vitals line.
pub fn performance() -> serde_json::Value {
    serde_json::json!({
        "type": "performance",
        "site_id": SITE_ID,
        "url": "https://example.com/",
        "lcp": 1800.0,
        "cls": 0.05,
        "fcp": 900.0,
        "ttfb": 120.0,
        "inp": 80.0,
        "page_load_time": 2100.0,
        "connection_type": "4g"
    })
}

/// JavaScript error line.
pub fn error_line() -> serde_json::Value {
    serde_json::json!({
        "type": "error",
        "site_id": SITE_ID,
        "url": "https://example.com/checkout",
        "error_type": "TypeError",
        "message": "x is undefined",
        "stack": "at checkout.js:10:5",
        "lineno": 10,
        "colno": 5
    })
}

/// Join lines into an NDJSON body.
pub fn ndjson(lines: &[serde_json::Value]) -> String {
    lines
        .iter()
        .map(|line| line.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// N pageviews on distinct paths.
pub fn pageviews(n: usize) -> Vec<serde_json::Value> {
    (0..n).map(|i| pageview(&format!("/page-{}", i))).collect()
}

/// A body over the 1 MiB cap.
pub fn oversized_body() -> String {
    let filler = "x".repeat(60_000);
    (0..20)
        .map(|_| serde_json::json!({ "type": "event", "site_id": SITE_ID, "name": filler }).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
