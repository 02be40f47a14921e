//! Host and URL helpers shared by origin checks and record construction.

use url::Url;

/// Lowercase, drop a port and a leading `www.`.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    let host = match host.strip_prefix('[') {
        // Bracketed IPv6 literal, keep the address only.
        Some(rest) => rest.split(']').next().unwrap_or_default().to_string(),
        None => host.split(':').next().unwrap_or_default().to_string(),
    };
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

/// Normalized host of an absolute URL (an Origin or Referer header value).
pub fn host_of(value: &str) -> Option<String> {
    let url = Url::parse(value.trim()).ok()?;
    let host = url.host_str()?;
    let host = normalize_host(host);
    (!host.is_empty()).then_some(host)
}

/// Path of an absolute URL, `/` when it has none or cannot be parsed.
pub fn path_of(value: &str) -> String {
    Url::parse(value.trim())
        .map(|u| u.path().to_string())
        .ok()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "/".to_string())
}

/// Hosts that are always accepted regardless of the registered domain.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

/// Whether `host` is the registered `domain` after normalizing both sides.
/// Subdomains other than `www.` do not match.
pub fn host_matches(host: &str, domain: &str) -> bool {
    let domain = normalize_host(domain);
    !domain.is_empty() && normalize_host(host) == domain
}
