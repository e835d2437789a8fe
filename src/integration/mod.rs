//! Integration mode resolution.
//!
//! An app's configuration document is loosely typed JSON. [`resolve_mode`]
//! normalizes the `integration.mode` field, and [`Integration::resolve`] turns
//! the whole document into a typed route once per run.

use serde_json::Value;
use std::time::Duration;

pub const MODE_SIMULATOR: &str = "simulator";
pub const MODE_WEBHOOK: &str = "webhook";

const LEGACY_WEBHOOK_MODES: [&str; 3] = ["webhook_sync", "webhook_async", "hybrid"];

/// Effective integration mode for `config`.
///
/// Missing mode means `simulator`. Legacy webhook aliases map to `webhook`.
/// Unknown values pass through unchanged and are routed like the simulator.
pub fn resolve_mode(config: &Value) -> String {
    let mode = config
        .get("integration")
        .and_then(|integration| integration.get("mode"))
        .and_then(Value::as_str)
        .unwrap_or(MODE_SIMULATOR);

    if LEGACY_WEBHOOK_MODES.contains(&mode) {
        MODE_WEBHOOK.to_string()
    } else {
        mode.to_string()
    }
}

/// Canned-response settings read from `config.simulator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorSettings {
    pub scenario: String,
    pub disclaimer: bool,
    pub latency_ms: u64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            scenario: "generic".into(),
            disclaimer: false,
            latency_ms: 0,
        }
    }
}

impl SimulatorSettings {
    /// Fields with the wrong type fall back to their defaults.
    pub fn from_config(config: &Value) -> Self {
        let defaults = Self::default();
        let Some(section) = config.get("simulator") else {
            return defaults;
        };

        Self {
            scenario: section
                .get("scenario")
                .and_then(Value::as_str)
                .map_or(defaults.scenario, ToString::to_string),
            disclaimer: section
                .get("disclaimer")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.disclaimer),
            latency_ms: section
                .get("latency_ms")
                .and_then(Value::as_u64)
                .unwrap_or(defaults.latency_ms),
        }
    }
}

/// Per-app webhook settings read from `config.webhook`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookSettings {
    pub timeout: Duration,
}

impl WebhookSettings {
    pub fn from_config(config: &Value, default_timeout: Duration) -> Self {
        let timeout = config
            .get("webhook")
            .and_then(|webhook| webhook.get("timeout_ms"))
            .and_then(Value::as_u64)
            .filter(|ms| *ms > 0)
            .map_or(default_timeout, Duration::from_millis);

        Self { timeout }
    }
}

/// Where a run's reply comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Integration {
    Simulator {
        settings: SimulatorSettings,
        /// Webhook mode was selected but the app has no URL.
        webhook_not_configured: bool,
    },
    Webhook {
        url: String,
        settings: WebhookSettings,
    },
}

impl Integration {
    /// Route an app: webhook only when the mode says so and a URL exists.
    pub fn resolve(config: &Value, webhook_url: Option<&str>, default_timeout: Duration) -> Self {
        let is_webhook = resolve_mode(config) == MODE_WEBHOOK;

        match webhook_url.filter(|url| !url.is_empty()) {
            Some(url) if is_webhook => Self::Webhook {
                url: url.to_string(),
                settings: WebhookSettings::from_config(config, default_timeout),
            },
            _ => Self::Simulator {
                settings: SimulatorSettings::from_config(config),
                webhook_not_configured: is_webhook,
            },
        }
    }
}
