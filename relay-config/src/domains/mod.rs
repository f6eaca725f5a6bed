//! Domain-specific configuration modules

pub mod factory;
pub mod logging;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Top-level configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Worker factory configuration
    #[serde(default)]
    pub factory: factory::FactoryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl RelayConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.factory.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = RelayConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_parses_back() {
        let sample = RelayConfig::generate_sample();
        let parsed: RelayConfig = serde_yaml::from_str(&sample).unwrap();
        assert!(parsed.validate_all().is_ok());
        assert_eq!(parsed.factory.listen, RelayConfig::default().factory.listen);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let parsed: RelayConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(parsed.factory.worker_count, 1);
        assert_eq!(parsed.logging.level, logging::LogLevel::Info);
    }
}
