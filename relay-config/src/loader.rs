//! Configuration loading and environment variable handling

use crate::domains::RelayConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "RELAY".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<RelayConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: RelayConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<RelayConfig> {
        let mut config = RelayConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<RelayConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut RelayConfig) -> ConfigResult<()> {
        self.apply_factory_overrides(&mut config.factory)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply factory config overrides
    fn apply_factory_overrides(
        &self,
        config: &mut crate::domains::factory::FactoryConfig,
    ) -> ConfigResult<()> {
        if let Ok(listen) = self.get_env_var("LISTEN") {
            config.listen = listen.parse()?;
        }

        if let Ok(timeout) = self.get_env_var("TIMEOUT_MS") {
            let millis: u64 = timeout
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid TIMEOUT_MS: {}", e)))?;
            config.relay_timeout = Duration::from_millis(millis);
        }

        if let Ok(timeout) = self.get_env_var("HANDSHAKE_TIMEOUT_MS") {
            let millis: u64 = timeout.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid HANDSHAKE_TIMEOUT_MS: {}", e))
            })?;
            config.handshake_timeout = Duration::from_millis(millis);
        }

        if let Ok(count) = self.get_env_var("WORKERS") {
            config.worker_count = count
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid WORKERS: {}", e)))?;
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = log_level
                .parse()
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = format
                .parse()
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
