use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL. Empty means `<data_dir>/relaydesk.db`.
    #[serde(default)]
    pub url: String,
    /// Pool size (default: 8)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing (default: 5000)
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    8
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}
