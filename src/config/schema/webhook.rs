use crate::security::url_validation::UrlRules;
use crate::webhook::WebhookPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outbound webhook settings shared by every app.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_header_app_id")]
    pub header_app_id: String,
    #[serde(default = "default_header_conversation_id")]
    pub header_conversation_id: String,
    #[serde(default = "default_header_timestamp")]
    pub header_timestamp: String,
    #[serde(default = "default_header_signature")]
    pub header_signature: String,
    /// Used when an app's integration document sets no `webhook.timeout_ms` (default: 8000)
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Max gap between two streamed body chunks; 0 disables the check (default: 30000)
    #[serde(default = "default_stream_idle_timeout_ms")]
    pub stream_idle_timeout_ms: u64,
    /// Messages forwarded as `history_tail` (default: 10)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_blocked_hosts")]
    pub blocked_hosts: Vec<String>,
    #[serde(default = "default_blocked_prefixes")]
    pub blocked_prefixes: Vec<String>,
    /// Also reject literal IPs in 172.16/12 and IPv6 private ranges (default: false)
    #[serde(default)]
    pub block_private_ranges: bool,
}

/// Header names attached to every outbound webhook request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookHeaderNames {
    pub app_id: String,
    pub conversation_id: String,
    pub timestamp: String,
    pub signature: String,
}

impl Default for WebhookHeaderNames {
    fn default() -> Self {
        Self {
            app_id: default_header_app_id(),
            conversation_id: default_header_conversation_id(),
            timestamp: default_header_timestamp(),
            signature: default_header_signature(),
        }
    }
}

fn default_header_app_id() -> String {
    "X-App-Id".into()
}

fn default_header_conversation_id() -> String {
    "X-Thread-Id".into()
}

fn default_header_timestamp() -> String {
    "X-Timestamp".into()
}

fn default_header_signature() -> String {
    "X-Signature".into()
}

fn default_timeout_ms() -> u64 {
    8_000
}

fn default_stream_idle_timeout_ms() -> u64 {
    30_000
}

fn default_history_limit() -> usize {
    10
}

fn default_blocked_hosts() -> Vec<String> {
    vec!["localhost".into(), "127.0.0.1".into(), "0.0.0.0".into()]
}

fn default_blocked_prefixes() -> Vec<String> {
    vec!["169.254.".into(), "10.".into(), "192.168.".into()]
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            header_app_id: default_header_app_id(),
            header_conversation_id: default_header_conversation_id(),
            header_timestamp: default_header_timestamp(),
            header_signature: default_header_signature(),
            default_timeout_ms: default_timeout_ms(),
            stream_idle_timeout_ms: default_stream_idle_timeout_ms(),
            history_limit: default_history_limit(),
            blocked_hosts: default_blocked_hosts(),
            blocked_prefixes: default_blocked_prefixes(),
            block_private_ranges: false,
        }
    }
}

impl WebhookConfig {
    pub fn header_names(&self) -> WebhookHeaderNames {
        WebhookHeaderNames {
            app_id: self.header_app_id.clone(),
            conversation_id: self.header_conversation_id.clone(),
            timestamp: self.header_timestamp.clone(),
            signature: self.header_signature.clone(),
        }
    }

    pub fn url_rules(&self) -> UrlRules {
        UrlRules {
            blocked_hosts: self.blocked_hosts.clone(),
            blocked_prefixes: self.blocked_prefixes.clone(),
            block_private_ranges: self.block_private_ranges,
        }
    }

    /// Freeze these settings into the value handed to gateways and the orchestrator.
    pub fn policy(&self) -> WebhookPolicy {
        WebhookPolicy {
            headers: self.header_names(),
            url_rules: self.url_rules(),
            default_timeout: Duration::from_millis(self.default_timeout_ms),
            stream_idle_timeout: (self.stream_idle_timeout_ms > 0)
                .then(|| Duration::from_millis(self.stream_idle_timeout_ms)),
            history_limit: self.history_limit,
        }
    }
}
