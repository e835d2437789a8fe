use super::super::{DatabaseConfig, GatewayConfig, WebhookConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory - computed from home, not serialized
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub simulator: SimulatorDefaults,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    "en".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::new(),
            config_path: PathBuf::new(),
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            webhook: WebhookConfig::default(),
            simulator: SimulatorDefaults::default(),
            log: LogConfig::default(),
            locale: default_locale(),
        }
    }
}

/// Process-wide knobs for the canned-response simulator. Per-app scenario
/// settings live in the app's integration document, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorDefaults {
    /// Characters per `delta` event when streaming a simulated reply (default: 20)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    20
}

impl Default for SimulatorDefaults {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// One of trace, debug, info, warn, error (default: info)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LogConfig {
    pub fn tracing_level(&self) -> Level {
        self.level.trim().parse().unwrap_or(Level::INFO)
    }
}
