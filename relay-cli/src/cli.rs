//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Listen for workers, spawn them and ping each one over its relay
    Serve {
        /// Address to listen on (tcp://host:port or unix:///path)
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,

        /// Number of workers to start
        #[arg(long, value_name = "N")]
        workers: Option<usize>,

        /// How long to wait for each worker to connect, in milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Payload sent to every worker once it is attached
        #[arg(long, value_name = "TEXT", default_value = "ping")]
        payload: String,

        /// Worker program and arguments; overrides the configured command
        #[arg(last = true, value_name = "COMMAND")]
        command: Vec<String>,
    },

    /// Run as a worker: dial the supervisor and echo every payload back
    Worker {
        /// Supervisor address to dial (tcp://host:port or unix:///path)
        #[arg(long, value_name = "ADDR", env = "RELAY_CONNECT")]
        connect: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_with_command() {
        let cli = Cli::try_parse_from([
            "relay",
            "--log-level",
            "debug",
            "serve",
            "--workers",
            "3",
            "--",
            "relay",
            "worker",
            "--connect",
            "tcp://127.0.0.1:6001",
        ])
        .unwrap();

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Commands::Serve {
                workers, command, ..
            } => {
                assert_eq!(workers, Some(3));
                assert_eq!(
                    command,
                    vec!["relay", "worker", "--connect", "tcp://127.0.0.1:6001"]
                );
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_worker_requires_connect() {
        assert!(Cli::try_parse_from(["relay", "worker"]).is_err());
    }
}
