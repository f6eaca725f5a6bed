//! `relay serve`: start workers through the factory and ping each one

use anyhow::{bail, Context, Result};
use futures::future::join_all;
use relay_config::{FactoryConfig, ListenAddress};
use relay_factory::SocketFactory;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info};

/// Environment variable telling a spawned worker where to dial
pub const CONNECT_ENV: &str = "RELAY_CONNECT";

/// Build the command for one worker from the configured argv
pub fn worker_command(argv: &[String], address: &ListenAddress) -> Result<Command> {
    let (program, args) = argv
        .split_first()
        .context("No worker command configured; pass one after `--`")?;

    let mut command = Command::new(program);
    command
        .args(args)
        .env(CONNECT_ENV, address.to_string())
        .stdin(Stdio::null());
    Ok(command)
}

pub async fn run(config: &FactoryConfig, payload: &str) -> Result<()> {
    if config.worker_command.is_empty() {
        bail!("No worker command configured; pass one after `--`");
    }

    let (factory, address) = SocketFactory::bind(config)
        .await
        .context("Failed to start worker factory")?;

    info!(
        workers = config.worker_count,
        address = %address,
        "Starting worker processes"
    );

    let mut spawns = Vec::with_capacity(config.worker_count);
    for _ in 0..config.worker_count {
        let command = worker_command(&config.worker_command, &address)?;
        spawns.push(factory.new_worker(command));
    }
    let results = join_all(spawns).await;

    let mut failures = 0;
    for result in results {
        let mut worker = match result {
            Ok(worker) => worker,
            Err(e) => {
                error!("Failed to start worker: {}", e);
                failures += 1;
                continue;
            }
        };

        match worker.exec(payload.as_bytes()).await {
            Ok(reply) => println!(
                "worker {}: {}",
                worker.pid().unwrap_or_default(),
                String::from_utf8_lossy(&reply)
            ),
            Err(e) => {
                error!("Worker {} failed to answer: {}", worker, e);
                failures += 1;
            }
        }

        if let Err(e) = worker.stop().await {
            error!("Failed to stop worker {}: {}", worker, e);
        }
    }

    factory.close()?;
    factory.wait_closed().await;

    if failures > 0 {
        bail!("{} of {} workers failed", failures, config.worker_count);
    }

    info!("All workers answered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_command_sets_connect_env() {
        let argv = vec!["relay".to_string(), "worker".to_string()];
        let address: ListenAddress = "tcp://127.0.0.1:6001".parse().unwrap();
        let command = worker_command(&argv, &address).unwrap();

        let std = command.as_std();
        assert_eq!(std.get_program(), "relay");
        assert_eq!(std.get_args().collect::<Vec<_>>(), vec!["worker"]);
        let connect = std
            .get_envs()
            .find(|(key, _)| *key == CONNECT_ENV)
            .and_then(|(_, value)| value);
        assert_eq!(
            connect.map(|v| v.to_string_lossy().into_owned()),
            Some("tcp://127.0.0.1:6001".to_string())
        );
    }

    #[test]
    fn test_worker_command_requires_program() {
        let address = ListenAddress::default();
        assert!(worker_command(&[], &address).is_err());
    }
}
