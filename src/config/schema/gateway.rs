use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway port (default: 8080)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Browser origins allowed to call the HTTP API
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".into(),
        "http://localhost:8000".into(),
    ]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            cors_origins: default_cors_origins(),
        }
    }
}
