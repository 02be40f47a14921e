//! Bot and fraud signal scoring.
//!
//! Scoring is a pure function of its inputs. Each check contributes a fixed
//! weight when it triggers; the weights are summed and clamped to `0..=100`.
//! Signals are kept in evaluation order so stored verdicts compare equal for
//! equal inputs.
//!
//! Bands: `0..=20` human, `21..=50` suspicious, `51..=100` bad bot. A user
//! agent on the crawler allow-list is `good_bot` whatever its score.

use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::line::lenient;
use crate::records::{BotCategory, BotSignal};

/// Scores above this are bots (`is_bot`).
pub const BOT_THRESHOLD: u8 = 50;

/// Scores above this are at least suspicious.
pub const SUSPICIOUS_THRESHOLD: u8 = 20;

/// Maximum score.
pub const MAX_SCORE: u8 = 100;

// === Weights ===

pub const W_WEBDRIVER: u32 = 60;
pub const W_HEADLESS_UA: u32 = 60;
pub const W_SCRIPTED_UA: u32 = 40;
pub const W_NO_PLUGINS: u32 = 20;
pub const W_NO_LANGUAGES: u32 = 20;
pub const W_ZERO_SCREEN: u32 = 20;
pub const W_DATACENTER_IP: u32 = 25;
pub const W_EMPTY_UA: u32 = 30;
pub const W_SHORT_UA: u32 = 20;
pub const W_MISSING_ACCEPT_LANGUAGE: u32 = 10;
pub const W_SUSPICIOUS_PATH: u32 = 30;

/// User agents shorter than this (but non-empty) are flagged.
const SHORT_UA_LEN: usize = 20;

/// Browser automation frameworks and headless builds.
static HEADLESS_UA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)headlesschrome|phantomjs|puppeteer|playwright|selenium|webdriver|slimerjs")
        .expect("invalid headless UA pattern")
});

/// HTTP libraries and command-line clients.
static SCRIPTED_UA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(curl|wget|python-requests|python-urllib|go-http-client|java/|okhttp|axios|node-fetch|libwww-perl|scrapy|httpclient|aiohttp)",
    )
    .expect("invalid scripted UA pattern")
});

/// Well-behaved crawlers that identify themselves.
static GOOD_BOT_UA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)googlebot|bingbot|duckduckbot|baiduspider|yandexbot|applebot|slurp|facebookexternalhit|twitterbot|linkedinbot|slackbot|discordbot|uptimerobot",
    )
    .expect("invalid good bot pattern")
});

/// Paths only exploit scanners ask for.
static PROBE_PATHS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)/wp-(admin|login\.php|config\.php|includes)",
        r"(?i)/xmlrpc\.php",
        r"(?i)/\.(env|git|aws|ssh|htaccess|htpasswd|ds_store)",
        r"(?i)/phpmyadmin",
        r"(?i)/administrator(/|$)",
        r"(?i)/admin\.php",
        r"(?i)/config\.(php|json|ya?ml|inc)",
        r"(?i)/cgi-bin/",
        r"(?i)/etc/passwd",
        r"(?i)/vendor/phpunit",
        r"(?i)/server-status",
        r"(?i)\.\./",
    ])
    .expect("invalid probe path patterns")
});

/// In-browser signals reported by the tracker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSignals {
    #[serde(default, deserialize_with = "lenient")]
    pub webdriver: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub plugins: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub languages: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub screen_width: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub screen_height: Option<u32>,
}

/// Scoring result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotVerdict {
    pub score: u8,
    pub category: BotCategory,
    pub signals: Vec<BotSignal>,
}

impl BotVerdict {
    pub fn is_bot(&self) -> bool {
        self.score > BOT_THRESHOLD
    }
}

/// Inputs for one classification.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub user_agent: &'a str,
    pub client: Option<&'a ClientSignals>,
    pub datacenter_ip: bool,
    /// Server-side evidence gathered outside the scorer, e.g. header checks
    pub extra: &'a [BotSignal],
}

/// Full classification: server baseline, merge of client evidence, then the
/// probe-path pass.
pub fn classify(input: ScoreInput<'_>, path: &str) -> BotVerdict {
    let baseline = score(ScoreInput {
        client: None,
        ..input
    });

    let mut verdict = match input.client {
        Some(_) => merge(baseline, score(input), input.user_agent),
        None => baseline,
    };

    apply_path_probe(&mut verdict, path);
    verdict
}

/// Evaluate every check in order and sum the triggered weights.
pub fn score(input: ScoreInput<'_>) -> BotVerdict {
    let ua = input.user_agent.trim();
    let mut signals = Vec::new();

    if let Some(client) = input.client {
        if client.webdriver == Some(true) {
            signals.push(BotSignal::new("webdriver", W_WEBDRIVER));
        }
    }

    if HEADLESS_UA.is_match(ua) {
        signals.push(BotSignal::new("headless_ua", W_HEADLESS_UA));
    } else if SCRIPTED_UA.is_match(ua) {
        signals.push(BotSignal::new("scripted_ua", W_SCRIPTED_UA));
    }

    if let Some(client) = input.client {
        if client.plugins == Some(0) {
            signals.push(BotSignal::new("no_plugins", W_NO_PLUGINS));
        }
        if client.languages == Some(0) {
            signals.push(BotSignal::new("no_languages", W_NO_LANGUAGES));
        }
        if client.screen_width == Some(0) && client.screen_height == Some(0) {
            signals.push(BotSignal::new("zero_screen", W_ZERO_SCREEN));
        }
    }

    if input.datacenter_ip {
        signals.push(BotSignal::new("datacenter_ip", W_DATACENTER_IP));
    }

    if ua.is_empty() {
        signals.push(BotSignal::new("empty_ua", W_EMPTY_UA));
    } else if ua.chars().count() < SHORT_UA_LEN {
        signals.push(BotSignal::new("short_ua", W_SHORT_UA));
    }

    signals.extend(input.extra.iter().cloned());

    finish(signals, is_good_bot(ua))
}

/// Combine a baseline with a verdict computed from more evidence.
///
/// The result holds the union of both signal lists, baseline first, so it can
/// never score below either input.
pub fn merge(baseline: BotVerdict, combined: BotVerdict, user_agent: &str) -> BotVerdict {
    let mut signals = baseline.signals;
    for signal in combined.signals {
        if !signals.iter().any(|s| s.name == signal.name) {
            signals.push(signal);
        }
    }
    finish(signals, is_good_bot(user_agent.trim()))
}

/// Second pass over the request path. A `good_bot` verdict keeps its category.
pub fn apply_path_probe(verdict: &mut BotVerdict, path: &str) {
    if !is_probe_path(path) {
        return;
    }

    let value: String = path.chars().take(128).collect();
    verdict
        .signals
        .push(BotSignal::new("suspicious_path", W_SUSPICIOUS_PATH).with_value(value));
    verdict.score = clamp(total_weight(&verdict.signals));
    if verdict.category != BotCategory::GoodBot {
        verdict.category = category_for(verdict.score);
    }
}

/// Signal for a request without `Accept-Language`.
pub fn accept_language_signal(accept_language: Option<&str>) -> Option<BotSignal> {
    match accept_language.map(str::trim) {
        Some(value) if !value.is_empty() => None,
        _ => Some(BotSignal::new("missing_accept_language", W_MISSING_ACCEPT_LANGUAGE)),
    }
}

pub fn is_good_bot(user_agent: &str) -> bool {
    GOOD_BOT_UA.is_match(user_agent)
}

pub fn is_probe_path(path: &str) -> bool {
    PROBE_PATHS.is_match(path)
}

/// Category for a numeric score, ignoring the allow-list.
pub fn category_for(score: u8) -> BotCategory {
    if score > BOT_THRESHOLD {
        BotCategory::BadBot
    } else if score > SUSPICIOUS_THRESHOLD {
        BotCategory::Suspicious
    } else {
        BotCategory::Human
    }
}

fn finish(signals: Vec<BotSignal>, good_bot: bool) -> BotVerdict {
    let score = clamp(total_weight(&signals));
    let category = if good_bot {
        BotCategory::GoodBot
    } else {
        category_for(score)
    };
    BotVerdict {
        score,
        category,
        signals,
    }
}

fn total_weight(signals: &[BotSignal]) -> u32 {
    signals.iter().fold(0u32, |acc, s| acc.saturating_add(s.weight))
}

fn clamp(total: u32) -> u8 {
    total.min(MAX_SCORE as u32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
    const HEADLESS: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) HeadlessChrome/120.0.0.0 Safari/537.36";

    fn input<'a>(ua: &'a str, client: Option<&'a ClientSignals>) -> ScoreInput<'a> {
        ScoreInput {
            user_agent: ua,
            client,
            datacenter_ip: false,
            extra: &[],
        }
    }

    fn names(verdict: &BotVerdict) -> Vec<&str> {
        verdict.signals.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_plain_browser_is_human() {
        let verdict = classify(input(CHROME, None), "/pricing");
        assert_eq!(verdict.score, 0);
        assert_eq!(verdict.category, BotCategory::Human);
        assert!(verdict.signals.is_empty());
        assert!(!verdict.is_bot());
    }

    #[test]
    fn test_webdriver_is_bad_bot() {
        let client = ClientSignals {
            webdriver: Some(true),
            ..Default::default()
        };
        let verdict = classify(input(CHROME, Some(&client)), "/");
        assert_eq!(verdict.category, BotCategory::BadBot);
        assert!(verdict.is_bot());
        assert_eq!(names(&verdict), vec!["webdriver"]);
    }

    #[test]
    fn test_headless_ua_is_bad_bot_without_client_signals() {
        let verdict = classify(input(HEADLESS, None), "/");
        assert_eq!(verdict.score, W_HEADLESS_UA as u8);
        assert_eq!(verdict.category, BotCategory::BadBot);
    }

    #[test]
    fn test_scripted_and_short_user_agents() {
        let verdict = score(input("curl/8.4.0", None));
        assert_eq!(names(&verdict), vec!["scripted_ua", "short_ua"]);
        assert_eq!(verdict.score, (W_SCRIPTED_UA + W_SHORT_UA) as u8);

        let verdict = score(input("", None));
        assert_eq!(names(&verdict), vec!["empty_ua"]);
    }

    #[test]
    fn test_good_bot_in_suspicious_band() {
        let extra = [BotSignal::new("missing_accept_language", W_MISSING_ACCEPT_LANGUAGE)];
        let verdict = classify(
            ScoreInput {
                user_agent: GOOGLEBOT,
                client: None,
                datacenter_ip: true,
                extra: &extra,
            },
            "/",
        );
        assert_eq!(verdict.score, 35);
        assert_eq!(category_for(verdict.score), BotCategory::Suspicious);
        assert_eq!(verdict.category, BotCategory::GoodBot);
    }

    #[test]
    fn test_clamps_to_max() {
        let client = ClientSignals {
            webdriver: Some(true),
            plugins: Some(0),
            languages: Some(0),
            screen_width: Some(0),
            screen_height: Some(0),
        };
        let verdict = classify(
            ScoreInput {
                user_agent: "HeadlessChrome",
                client: Some(&client),
                datacenter_ip: true,
                extra: &[],
            },
            "/.env",
        );
        assert_eq!(verdict.score, MAX_SCORE);
        assert_eq!(verdict.category, BotCategory::BadBot);
    }

    #[test]
    fn test_deterministic() {
        let client = ClientSignals {
            plugins: Some(0),
            ..Default::default()
        };
        let a = classify(input(CHROME, Some(&client)), "/wp-admin/");
        let b = classify(input(CHROME, Some(&client)), "/wp-admin/");
        assert_eq!(a, b);
    }

    #[test]
    fn test_adding_signals_never_lowers_score() {
        let steps = [
            ClientSignals::default(),
            ClientSignals {
                plugins: Some(0),
                ..Default::default()
            },
            ClientSignals {
                plugins: Some(0),
                languages: Some(0),
                ..Default::default()
            },
            ClientSignals {
                plugins: Some(0),
                languages: Some(0),
                screen_width: Some(0),
                screen_height: Some(0),
                ..Default::default()
            },
            ClientSignals {
                webdriver: Some(true),
                plugins: Some(0),
                languages: Some(0),
                screen_width: Some(0),
                screen_height: Some(0),
            },
        ];

        let mut last = 0;
        for client in &steps {
            let verdict = score(input(CHROME, Some(client)));
            assert!(verdict.score >= last, "score dropped from {} to {}", last, verdict.score);
            last = verdict.score;

            let with_datacenter = score(ScoreInput {
                datacenter_ip: true,
                ..input(CHROME, Some(client))
            });
            assert!(with_datacenter.score >= verdict.score);
        }
    }

    #[test]
    fn test_client_signals_cannot_downgrade() {
        let client = ClientSignals {
            webdriver: Some(false),
            plugins: Some(5),
            languages: Some(2),
            screen_width: Some(1920),
            screen_height: Some(1080),
        };
        let verdict = classify(
            ScoreInput {
                user_agent: HEADLESS,
                client: Some(&client),
                datacenter_ip: true,
                extra: &[],
            },
            "/",
        );
        assert_eq!(verdict.category, BotCategory::BadBot);
        assert_eq!(names(&verdict), vec!["headless_ua", "datacenter_ip"]);
    }

    #[test]
    fn test_merge_keeps_baseline_order_and_dedups() {
        let baseline = BotVerdict {
            score: 25,
            category: BotCategory::Suspicious,
            signals: vec![BotSignal::new("datacenter_ip", W_DATACENTER_IP)],
        };
        let combined = BotVerdict {
            score: 65,
            category: BotCategory::BadBot,
            signals: vec![
                BotSignal::new("webdriver", W_WEBDRIVER),
                BotSignal::new("datacenter_ip", W_DATACENTER_IP),
            ],
        };
        let merged = merge(baseline, combined, CHROME);
        assert_eq!(names(&merged), vec!["datacenter_ip", "webdriver"]);
        assert_eq!(merged.score, 85);
    }

    #[test]
    fn test_probe_path_rescores() {
        let verdict = classify(input(CHROME, None), "/wp-login.php");
        assert_eq!(verdict.score, W_SUSPICIOUS_PATH as u8);
        assert_eq!(verdict.category, BotCategory::Suspicious);
        assert_eq!(verdict.signals[0].value.as_deref(), Some("/wp-login.php"));
    }

    #[test]
    fn test_probe_path_keeps_good_bot() {
        let verdict = classify(input(GOOGLEBOT, None), "/.git/config");
        assert_eq!(verdict.category, BotCategory::GoodBot);
        assert_eq!(names(&verdict), vec!["suspicious_path"]);
    }

    #[test]
    fn test_category_boundaries() {
        assert_eq!(category_for(0), BotCategory::Human);
        assert_eq!(category_for(20), BotCategory::Human);
        assert_eq!(category_for(21), BotCategory::Suspicious);
        assert_eq!(category_for(50), BotCategory::Suspicious);
        assert_eq!(category_for(51), BotCategory::BadBot);
        assert_eq!(category_for(100), BotCategory::BadBot);
    }

    #[test]
    fn test_accept_language_signal() {
        assert!(accept_language_signal(Some("en-US,en;q=0.9")).is_none());
        assert!(accept_language_signal(Some("  ")).is_some());
        assert!(accept_language_signal(None).is_some());
    }

    #[test]
    fn test_regular_paths_are_not_probes() {
        assert!(!is_probe_path("/"));
        assert!(!is_probe_path("/blog/admin-tips"));
        assert!(!is_probe_path("/docs/configuration"));
        assert!(is_probe_path("/phpmyadmin/index.php"));
    }
}
