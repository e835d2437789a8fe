//! SSRF protection: validates webhook targets before any request is made.
//!
//! The default rules are a fixed host list plus string prefixes. They do not
//! cover 172.16.0.0/12 or IPv6 private ranges; set `block_private_ranges` to
//! additionally reject any literal IP that [`is_private_ip`] flags.

use crate::error::WebhookError;
use std::net::IpAddr;

/// Host rules applied to every webhook URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRules {
    pub blocked_hosts: Vec<String>,
    pub blocked_prefixes: Vec<String>,
    pub block_private_ranges: bool,
}

impl Default for UrlRules {
    fn default() -> Self {
        Self {
            blocked_hosts: vec!["localhost".into(), "127.0.0.1".into(), "0.0.0.0".into()],
            blocked_prefixes: vec!["169.254.".into(), "10.".into(), "192.168.".into()],
            block_private_ranges: false,
        }
    }
}

impl UrlRules {
    /// No host restrictions at all. Only scheme and host presence are checked.
    pub fn permissive() -> Self {
        Self {
            blocked_hosts: Vec::new(),
            blocked_prefixes: Vec::new(),
            block_private_ranges: false,
        }
    }

    /// Default list plus the CIDR-based private range check.
    pub fn strict() -> Self {
        Self {
            block_private_ranges: true,
            ..Self::default()
        }
    }
}

/// Check whether an IP address is private, loopback, link-local, or metadata.
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            let segs = v6.segments();
            v6.is_loopback()
                || v6.is_unspecified()
                || (segs[0] & 0xfe00) == 0xfc00 // unique-local fc00::/7
                || (segs[0] & 0xffc0) == 0xfe80 // link-local fe80::/10
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}

/// Validate a webhook target URL. Runs once, when a gateway is built.
pub fn validate_webhook_url(url: &str, rules: &UrlRules) -> Result<url::Url, WebhookError> {
    if url.is_empty() {
        return Err(WebhookError::InvalidUrl(
            "webhook URL must not be empty".into(),
        ));
    }

    let parsed = url::Url::parse(url).map_err(|e| WebhookError::InvalidUrl(e.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(WebhookError::InvalidUrl(format!(
            "webhook URL must use http or https scheme, got '{}'",
            parsed.scheme()
        )));
    }

    let host = parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| WebhookError::InvalidUrl("webhook URL must have a host".into()))?;
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if rules.blocked_hosts.iter().any(|blocked| blocked == bare) {
        return Err(WebhookError::InvalidUrl(format!(
            "webhook URL host '{bare}' is blocked"
        )));
    }

    if rules
        .blocked_prefixes
        .iter()
        .any(|prefix| bare.starts_with(prefix.as_str()))
    {
        return Err(WebhookError::InvalidUrl(format!(
            "webhook URL host '{bare}' is blocked (private network)"
        )));
    }

    if rules.block_private_ranges
        && let Ok(ip) = bare.parse::<IpAddr>()
        && is_private_ip(&ip)
    {
        return Err(WebhookError::InvalidUrl(format!(
            "webhook URL host '{bare}' is blocked (private network)"
        )));
    }

    Ok(parsed)
}
