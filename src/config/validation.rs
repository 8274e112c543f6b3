//! Input checks applied to user-supplied settings.

use std::net::IpAddr;

use reqwest::Url;

/// Cloud metadata endpoints; a misconfigured URL must never reach them.
pub const BLOCKED_HOSTS: &[&str] = &[
    "169.254.169.254",
    "metadata.google.internal",
    "metadata.azure.com",
    "100.100.100.200",
];

pub const ALLOWED_LOG_LEVELS: &[&str] = &["debug", "info", "warning", "error"];

/// Accepts an empty URL (app left unconfigured) or an http(s) URL with a
/// host that is not a metadata service, link-local, loopback or unspecified
/// IP literal. Private network ranges are allowed.
pub fn validate_arr_url(url: &str) -> Result<(), &'static str> {
    let url = url.trim();
    if url.is_empty() {
        return Ok(());
    }

    let parsed = Url::parse(url).map_err(|_| "URL is not valid")?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err("URL scheme must be http or https");
    }

    let host = match parsed.host_str() {
        Some(h) if !h.is_empty() => h,
        _ => return Err("URL has no hostname"),
    };
    if BLOCKED_HOSTS.contains(&host) {
        return Err("Blocked hostname");
    }

    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(addr) = literal.parse::<IpAddr>() {
        if is_blocked_address(&addr) {
            return Err("Blocked address");
        }
    }
    Ok(())
}

fn is_blocked_address(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_link_local() || v4.is_loopback() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            // fe80::/10
            let link_local = (v6.segments()[0] & 0xffc0) == 0xfe80;
            link_local || v6.is_loopback() || v6.is_unspecified()
        }
    }
}

/// Clamps `value` into `[min, max]`, or returns `default` when unset.
/// The second element tells whether the configured value was changed.
pub fn clamp_setting(value: Option<i64>, default: i64, min: i64, max: i64) -> (i64, bool) {
    match value {
        None => (default, false),
        Some(v) => {
            let clamped = v.clamp(min, max);
            (clamped, clamped != v)
        }
    }
}

/// Normalizes a log level name, falling back to `info`.
pub fn safe_log_level(value: Option<&str>) -> &'static str {
    let cleaned = value.map(|v| v.trim().to_lowercase()).unwrap_or_default();
    ALLOWED_LOG_LEVELS
        .iter()
        .find(|level| **level == cleaned)
        .copied()
        .unwrap_or("info")
}
