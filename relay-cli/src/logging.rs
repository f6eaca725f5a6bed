//! Tracing setup for the relay binary

use anyhow::Result;
use relay_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Initialize tracing from configuration.
///
/// The command-line level wins over the configured one; `RUST_LOG` is used
/// when neither parses. Output goes to stderr so it never mixes with what a
/// worker prints on stdout.
pub fn init_logging(config: &LoggingConfig, cli_level: Option<&str>) -> Result<()> {
    let level = cli_level
        .map(str::to_string)
        .unwrap_or_else(|| config.level.to_string());

    let env_filter = EnvFilter::try_new(&level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    // Use try_init to avoid panic if global subscriber already set
    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };

    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}
