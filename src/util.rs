//! Shared helpers for the AppMart server.

use std::net::IpAddr;

use reqwest::Url;
use uuid::Uuid;

/// Format cents as a decimal amount, e.g. `2000` -> `"20.00"`.
pub fn format_money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, cents / 100, cents % 100)
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Whether a URL points at this machine. Payment providers refuse loopback
/// callback URLs, so these are left out of checkout requests.
pub fn is_loopback_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    match host.parse::<IpAddr>() {
        Ok(ip) => ip.is_loopback(),
        Err(_) => host.eq_ignore_ascii_case("localhost") || host.ends_with(".localhost"),
    }
}

/// Download tokens are hyphenated UUIDs. Checked before anything touches the filesystem.
pub fn is_valid_download_token(token: &str) -> bool {
    token.len() == 36 && Uuid::try_parse(token).is_ok()
}

/// A stored file name: a single path component with no traversal.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && name != "."
        && name != ".."
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
