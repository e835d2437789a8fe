use super::Config;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port_str) =
            std::env::var("RELAYDESK_GATEWAY_PORT").or_else(|_| std::env::var("PORT"))
            && let Ok(port) = port_str.parse::<u16>()
        {
            self.gateway.port = port;
        }

        if let Ok(host) =
            std::env::var("RELAYDESK_GATEWAY_HOST").or_else(|_| std::env::var("HOST"))
            && !host.is_empty()
        {
            self.gateway.host = host;
        }

        if let Ok(url) =
            std::env::var("RELAYDESK_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL"))
            && !url.is_empty()
        {
            self.database.url = url;
        }

        if let Ok(level) = std::env::var("RELAYDESK_LOG")
            && !level.is_empty()
        {
            self.log.level = level;
        }

        if let Ok(timeout_str) = std::env::var("RELAYDESK_WEBHOOK_TIMEOUT_MS")
            && let Ok(timeout) = timeout_str.parse::<u64>()
            && timeout > 0
        {
            self.webhook.default_timeout_ms = timeout;
        }
    }
}
