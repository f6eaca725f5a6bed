//! Background loop accepting worker connections.
//!
//! Connections are handled one at a time: a peer that stalls during the
//! handshake delays the next accept by at most the handshake timeout.

use std::sync::Arc;
use std::time::Duration;

use relay_ipc::SocketRelay;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::HandshakeError;
use crate::handshake::fetch_pid;
use crate::listener::RelayListener;
use crate::registry::CorrelationRegistry;

pub(crate) struct AcceptLoop<L> {
    pub listener: L,
    pub registry: Arc<CorrelationRegistry<SocketRelay>>,
    pub own_pid: u32,
    pub handshake_timeout: Duration,
    pub shutdown: CancellationToken,
}

impl<L: RelayListener> AcceptLoop<L> {
    /// Run until the listener fails or shutdown is requested.
    /// The listener is dropped on return.
    pub async fn run(self) {
        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!("factory closed, stopping acceptance loop");
                    return;
                }
                accepted = self.listener.accept_stream() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    debug!(error = %e, "accept failed, stopping acceptance loop");
                    return;
                }
            };

            debug!(peer = %peer, "accepted worker connection");
            let relay = SocketRelay::new(stream, peer);

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!("factory closed during handshake");
                    return;
                }
                _ = self.pair(relay) => {}
            }
        }
    }

    async fn pair(&self, mut relay: SocketRelay) {
        let result = match tokio::time::timeout(
            self.handshake_timeout,
            fetch_pid(&mut relay, self.own_pid),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(HandshakeError::Timeout(self.handshake_timeout)),
        };

        let pid = match result {
            Ok(pid) => pid,
            Err(e) => {
                warn!(peer = %relay.peer(), error = %e, "discarding worker connection");
                return;
            }
        };

        if self.shutdown.is_cancelled() {
            return;
        }

        match self.registry.deliver(pid, relay) {
            Ok(()) => debug!(pid, "relay delivered"),
            Err(relay) => warn!(
                pid,
                peer = %relay.peer(),
                "discarding duplicate connection for pid"
            ),
        }
    }
}
