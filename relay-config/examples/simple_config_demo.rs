//! Simple configuration demo
//!
//! A minimal example showing basic configuration loading

use relay_config::{ConfigLoader, ConfigResult};
use std::fs;
use tempfile::TempDir;

fn main() -> ConfigResult<()> {
    println!("Simple relay configuration demo");

    // Create temporary directory for demo files
    let temp_dir = TempDir::new()?;

    // Create a simple config file
    let config_path = temp_dir.path().join("config.yaml");
    let config_content = r#"
factory:
  listen: "unix:///tmp/relay-demo.sock"
  relay_timeout: 5000
  handshake_timeout: 1000
  worker_command: ["relay", "worker"]
  worker_count: 2

logging:
  level: "debug"
  format: "json"
"#;

    fs::write(&config_path, config_content)?;

    // Load the configuration
    let loader = ConfigLoader::new();
    let config = loader.from_file(&config_path)?;
    config.validate_all()?;

    println!("Configuration loaded successfully");
    println!("   Listen: {}", config.factory.listen);
    println!("   Relay timeout: {:?}", config.factory.relay_timeout);
    println!("   Workers: {} x {:?}", config.factory.worker_count, config.factory.worker_command);
    println!("   Logging level: {}", config.logging.level);

    println!("\nSample configuration:\n{}", relay_config::RelayConfig::generate_sample());

    Ok(())
}
