pub mod schema;

pub use schema::{
    Config, DatabaseConfig, GatewayConfig, LogConfig, SimulatorDefaults, WebhookConfig,
    WebhookHeaderNames,
};
