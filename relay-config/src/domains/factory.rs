//! Worker factory configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::validation::{validate_positive, validate_required_string, Validatable};

/// Socket the factory listens on for workers dialing back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ListenAddress {
    /// `tcp://host:port`
    Tcp(String),
    /// `unix:///path/to/socket`
    Unix(PathBuf),
}

impl FromStr for ListenAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(ConfigError::InvalidAddress(s.to_string()));
            }
            return Ok(ListenAddress::Unix(PathBuf::from(path)));
        }

        let addr = s.strip_prefix("tcp://").unwrap_or(s);
        match addr.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(ListenAddress::Tcp(addr.to_string()))
            }
            _ => Err(ConfigError::InvalidAddress(s.to_string())),
        }
    }
}

impl TryFrom<String> for ListenAddress {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ListenAddress> for String {
    fn from(value: ListenAddress) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddress::Tcp(addr) => write!(f, "tcp://{}", addr),
            ListenAddress::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl Default for ListenAddress {
    fn default() -> Self {
        ListenAddress::Tcp("127.0.0.1:6001".to_string())
    }
}

/// Worker factory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    /// Address workers dial back to
    #[serde(default)]
    pub listen: ListenAddress,

    /// How long `new_worker` waits for the spawned process to connect
    #[serde(with = "crate::domains::utils::serde_duration_ms", default = "default_relay_timeout")]
    pub relay_timeout: Duration,

    /// Upper bound on a single handshake inside the acceptance loop
    #[serde(with = "crate::domains::utils::serde_duration_ms", default = "default_handshake_timeout")]
    pub handshake_timeout: Duration,

    /// Program and arguments used to start a worker
    #[serde(default)]
    pub worker_command: Vec<String>,

    /// Number of workers the `serve` command starts
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            listen: ListenAddress::default(),
            relay_timeout: default_relay_timeout(),
            handshake_timeout: default_handshake_timeout(),
            worker_command: Vec::new(),
            worker_count: default_worker_count(),
        }
    }
}

impl Validatable for FactoryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.relay_timeout.as_millis(),
            "relay_timeout",
            self.domain_name(),
        )?;

        validate_positive(
            self.handshake_timeout.as_millis(),
            "handshake_timeout",
            self.domain_name(),
        )?;

        validate_positive(self.worker_count, "worker_count", self.domain_name())?;

        if let Some(program) = self.worker_command.first() {
            validate_required_string(program, "worker_command[0]", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "factory"
    }
}

// Default value functions
fn default_relay_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_handshake_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_worker_count() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_config_defaults() {
        let config = FactoryConfig::default();
        assert_eq!(config.relay_timeout, Duration::from_secs(60));
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.worker_count, 1);
        assert!(config.worker_command.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_factory_config_validation() {
        let mut config = FactoryConfig::default();
        config.relay_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = FactoryConfig::default();
        config.worker_count = 0;
        assert!(config.validate().is_err());

        let mut config = FactoryConfig::default();
        config.worker_command = vec![String::new()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_listen_address() {
        assert_eq!(
            "tcp://0.0.0.0:7000".parse::<ListenAddress>().unwrap(),
            ListenAddress::Tcp("0.0.0.0:7000".to_string())
        );
        assert_eq!(
            "localhost:7000".parse::<ListenAddress>().unwrap(),
            ListenAddress::Tcp("localhost:7000".to_string())
        );
        assert_eq!(
            "unix:///run/relay.sock".parse::<ListenAddress>().unwrap(),
            ListenAddress::Unix(PathBuf::from("/run/relay.sock"))
        );

        assert!("unix://".parse::<ListenAddress>().is_err());
        assert!("tcp://nohost".parse::<ListenAddress>().is_err());
        assert!("tcp://:80".parse::<ListenAddress>().is_err());
        assert!("host:99999".parse::<ListenAddress>().is_err());
    }

    #[test]
    fn test_listen_address_display_round_trips() {
        for raw in ["tcp://127.0.0.1:6001", "unix:///tmp/relay.sock"] {
            let addr: ListenAddress = raw.parse().unwrap();
            assert_eq!(addr.to_string(), raw);
        }
    }

    #[test]
    fn test_yaml_millisecond_durations() {
        let yaml = r#"
listen: unix:///tmp/relay.sock
relay_timeout: 50
handshake_timeout: 250
worker_command: ["php", "worker.php"]
worker_count: 4
"#;
        let config: FactoryConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listen, ListenAddress::Unix(PathBuf::from("/tmp/relay.sock")));
        assert_eq!(config.relay_timeout, Duration::from_millis(50));
        assert_eq!(config.handshake_timeout, Duration::from_millis(250));
        assert_eq!(config.worker_command, vec!["php", "worker.php"]);
        assert_eq!(config.worker_count, 4);
    }

    #[test]
    fn test_yaml_rejects_bad_address() {
        let result: Result<FactoryConfig, _> = serde_yaml::from_str("listen: nowhere");
        assert!(result.is_err());
    }
}
