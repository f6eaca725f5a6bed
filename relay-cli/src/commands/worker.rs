//! `relay worker`: the process side of the factory handshake

use anyhow::{Context, Result};
use relay_config::ListenAddress;
use relay_factory::{announce, connect, IpcError, PayloadFlags, Relay, SocketRelay};
use tracing::{debug, info, warn};

/// Dial the supervisor, complete the handshake and echo payloads until the
/// supervisor hangs up.
pub async fn run(connect_to: &str) -> Result<()> {
    let address: ListenAddress = connect_to
        .parse()
        .with_context(|| format!("Invalid supervisor address: {}", connect_to))?;

    let stream = connect(&address)
        .await
        .with_context(|| format!("Failed to connect to {}", address))?;
    let mut relay = SocketRelay::new(stream, address.to_string());

    let own_pid = std::process::id();
    let supervisor = announce(&mut relay, own_pid)
        .await
        .context("Handshake with supervisor failed")?;

    #[cfg(unix)]
    {
        let parent = std::os::unix::process::parent_id();
        if parent != supervisor {
            warn!(supervisor, parent, "supervisor is not our parent process");
        }
    }

    info!(pid = own_pid, supervisor, "Worker connected");

    loop {
        match relay.receive().await {
            Ok((_, flags)) if flags.contains(PayloadFlags::CONTROL) => {
                debug!("Ignoring control frame");
            }
            Ok((body, _)) => relay.send(&body, PayloadFlags::RAW).await?,
            Err(IpcError::ConnectionClosed) => break,
            Err(e) => return Err(e.into()),
        }
    }

    info!(pid = own_pid, "Supervisor closed the relay, shutting down");
    Ok(())
}
