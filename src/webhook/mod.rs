//! Outbound webhook dispatch: canonical payloads, signed requests, and the
//! single-shot and streaming HTTP calls to a partner endpoint.

mod gateway;
pub mod payload;
mod probe;

pub use gateway::{OutboundRequest, WebhookByteStream, WebhookGateway};
pub use payload::{OutboundPayload, canonical_json};
pub use probe::ProbeReport;

use crate::config::{WebhookConfig, WebhookHeaderNames};
use crate::security::UrlRules;
use std::time::Duration;

/// Settings every gateway is built with. Passed explicitly so differently
/// configured gateways can coexist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookPolicy {
    pub headers: WebhookHeaderNames,
    pub url_rules: UrlRules,
    pub default_timeout: Duration,
    /// Longest allowed gap between streamed chunks. `None` waits forever.
    pub stream_idle_timeout: Option<Duration>,
    pub history_limit: usize,
}

impl Default for WebhookPolicy {
    fn default() -> Self {
        WebhookConfig::default().policy()
    }
}

impl WebhookPolicy {
    pub fn with_url_rules(mut self, url_rules: UrlRules) -> Self {
        self.url_rules = url_rules;
        self
    }
}
