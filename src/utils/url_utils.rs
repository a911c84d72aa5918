//! URL validation helpers.
//!
//! Scrape targets must be absolute `http`/`https` URLs with a host that looks
//! like a domain name, `localhost`, or an IPv4 address.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // domain, localhost or dotted quad, optional port, optional path/query
    Regex::new(
        r"(?i)^https?://(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+[A-Z]{2,63}\.?|localhost|\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?::\d+)?(?:/?|[/?#]\S+)$",
    )
    .expect("Invalid URL pattern regex")
});

/// Validate a scrape target URL
///
/// Returns the parsed URL, or a human-readable reason for rejection.
pub fn validate_url(raw: &str) -> Result<Url, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("URL must be a non-empty string".to_string());
    }

    if !URL_PATTERN.is_match(trimmed) {
        return Err("URL must be a valid http or https URL".to_string());
    }

    let parsed = Url::parse(trimmed).map_err(|e| format!("URL parsing failed: {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err("URL must use http or https protocol".to_string());
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err("URL must have a valid domain".to_string());
    }

    Ok(parsed)
}
