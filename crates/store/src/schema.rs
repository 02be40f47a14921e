//! SQLite table schemas.
//!
//! - timestamps are milliseconds since the epoch
//! - booleans are INTEGER 0/1
//! - `bot_signals` and `props` are JSON text

pub const CREATE_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    timestamp INTEGER NOT NULL,
    event_type TEXT NOT NULL,
    session_id TEXT NOT NULL CHECK (session_id <> ''),
    visitor_hash TEXT NOT NULL CHECK (visitor_hash <> ''),
    domain TEXT NOT NULL,
    url TEXT NOT NULL,
    path TEXT NOT NULL,

    country TEXT,
    region TEXT,
    city TEXT,
    latitude REAL,
    longitude REAL,

    browser TEXT NOT NULL,
    browser_version TEXT NOT NULL,
    os TEXT NOT NULL,
    device TEXT NOT NULL,

    is_bot INTEGER NOT NULL,
    bot_score INTEGER NOT NULL CHECK (bot_score BETWEEN 0 AND 100),
    bot_category TEXT NOT NULL,
    bot_signals TEXT NOT NULL DEFAULT '[]',
    mouse_moved INTEGER NOT NULL DEFAULT 0,
    scrolled INTEGER NOT NULL DEFAULT 0,
    keyboard_used INTEGER NOT NULL DEFAULT 0,

    click_x REAL,
    click_y REAL,
    scroll_depth REAL,
    duration INTEGER,
    referrer TEXT,
    utm_source TEXT,
    utm_medium TEXT,
    utm_campaign TEXT,
    utm_term TEXT,
    utm_content TEXT,
    name TEXT,
    props TEXT
)
"#;

pub const CREATE_PERFORMANCE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS performance (
    id TEXT PRIMARY KEY,
    timestamp INTEGER NOT NULL,
    session_id TEXT NOT NULL CHECK (session_id <> ''),
    visitor_hash TEXT NOT NULL CHECK (visitor_hash <> ''),
    domain TEXT NOT NULL,
    url TEXT NOT NULL,
    path TEXT NOT NULL,
    lcp REAL,
    cls REAL,
    fcp REAL,
    ttfb REAL,
    inp REAL,
    page_load_time REAL,
    connection_type TEXT
)
"#;

pub const CREATE_ERRORS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS errors (
    id TEXT PRIMARY KEY,
    timestamp INTEGER NOT NULL,
    session_id TEXT NOT NULL CHECK (session_id <> ''),
    visitor_hash TEXT NOT NULL CHECK (visitor_hash <> ''),
    domain TEXT NOT NULL,
    url TEXT NOT NULL,
    path TEXT NOT NULL,
    error_type TEXT NOT NULL,
    message TEXT NOT NULL,
    stack TEXT,
    script_url TEXT,
    line INTEGER,
    col INTEGER,
    error_hash TEXT
)
"#;

/// Registry of tracking targets. Managed elsewhere; this service only reads
/// it, apart from startup seeding.
pub const CREATE_SITES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    domain TEXT NOT NULL,
    site_id TEXT NOT NULL UNIQUE,
    is_active INTEGER NOT NULL DEFAULT 1
)
"#;

pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_events_domain_ts ON events (domain, timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_events_session ON events (session_id)",
    "CREATE INDEX IF NOT EXISTS idx_performance_domain_ts ON performance (domain, timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_errors_domain_ts ON errors (domain, timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_errors_hash ON errors (error_hash)",
];

/// All DDL in execution order.
pub fn all_statements() -> Vec<&'static str> {
    let mut statements = vec![
        CREATE_SITES_TABLE,
        CREATE_EVENTS_TABLE,
        CREATE_PERFORMANCE_TABLE,
        CREATE_ERRORS_TABLE,
    ];
    statements.extend_from_slice(CREATE_INDEXES);
    statements
}

/// Record tables written by the ingestion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Events,
    Performance,
    Errors,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Performance => "performance",
            Self::Errors => "errors",
        }
    }
}
