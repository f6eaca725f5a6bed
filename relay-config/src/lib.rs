//! Configuration management for the relay worker factory
//!
//! Configuration is split by domain, loaded from YAML with environment
//! variable overrides, and validated before use.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    factory::{FactoryConfig, ListenAddress},
    logging::{LogFormat, LogLevel, LoggingConfig},
    RelayConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration_ms;
