use super::Config;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::Path;

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Self::load_or_init_in(&home.join(".relaydesk"))
    }

    /// Load `config.toml` from `dir`, writing defaults there on first run.
    pub fn load_or_init_in(dir: &Path) -> Result<Self> {
        let config_path = dir.join("config.toml");

        if !dir.exists() {
            fs::create_dir_all(dir).context("Failed to create .relaydesk directory")?;
        }

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            config.data_dir = dir.to_path_buf();
            config
        } else {
            let config = Self {
                config_path: config_path.clone(),
                data_dir: dir.to_path_buf(),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    /// sqlx URL for the message store; defaults to a file inside the data directory.
    pub fn database_url(&self) -> String {
        if self.database.url.trim().is_empty() {
            format!(
                "sqlite://{}?mode=rwc",
                self.data_dir.join("relaydesk.db").display()
            )
        } else {
            self.database.url.clone()
        }
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.simulator.chunk_size > 0, "simulator.chunk_size"),
            (self.webhook.default_timeout_ms > 0, "webhook.default_timeout_ms"),
            (self.database.max_connections > 0, "database.max_connections"),
        ];

        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, field)) => Err(ConfigError::Validation(format!(
                "{field} must be greater than zero"
            ))),
            None => Ok(()),
        }
    }
}
