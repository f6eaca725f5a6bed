use anyhow::{Context, Result};
use clap::Parser;
use relay_config::ConfigLoader;
use std::time::Duration;
use tracing::debug;

mod cli;
mod commands;
mod logging;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::new()
        .load(cli.config.as_ref())
        .context("Failed to load configuration")?;

    logging::init_logging(&config.logging, cli.log_level.as_deref())?;

    match cli.command {
        Commands::Serve {
            listen,
            workers,
            timeout_ms,
            payload,
            command,
        } => {
            if let Some(listen) = listen {
                config.factory.listen = listen.parse()?;
            }
            if let Some(workers) = workers {
                config.factory.worker_count = workers;
            }
            if let Some(timeout_ms) = timeout_ms {
                config.factory.relay_timeout = Duration::from_millis(timeout_ms);
            }
            if !command.is_empty() {
                config.factory.worker_command = command;
            }
            config
                .validate_all()
                .context("Invalid configuration after command line overrides")?;

            debug!(?config, "Effective configuration");
            commands::serve::run(&config.factory, &payload).await
        }
        Commands::Worker { connect } => commands::worker::run(&connect).await,
    }
}
