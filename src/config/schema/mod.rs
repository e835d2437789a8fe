mod core;
mod gateway;
mod storage;
mod webhook;

pub use core::{Config, LogConfig, SimulatorDefaults};
pub use gateway::GatewayConfig;
pub use storage::DatabaseConfig;
pub use webhook::{WebhookConfig, WebhookHeaderNames};
