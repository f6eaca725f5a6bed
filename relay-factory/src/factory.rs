//! Socket-based worker factory.
//!
//! Spawned workers dial back into the factory's listener. A background loop
//! accepts each connection, learns the peer's pid through the handshake and
//! parks the relay in the correlation registry, where `new_worker` picks it up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use relay_config::{FactoryConfig, ListenAddress};
use relay_ipc::SocketRelay;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::acceptor::AcceptLoop;
use crate::error::{FactoryError, FactoryResult};
use crate::listener::{BoundListener, RelayListener};
use crate::registry::CorrelationRegistry;
use crate::worker::Worker;

/// Creates workers and pairs each one with the relay it opens back to us
pub struct SocketFactory {
    registry: Arc<CorrelationRegistry<SocketRelay>>,
    relay_timeout: Duration,
    local_pid: u32,
    shutdown: CancellationToken,
    closed: AtomicBool,
    accept_loop: Mutex<Option<JoinHandle<()>>>,
}

impl SocketFactory {
    /// Start a factory on `listener`; handshakes share the relay timeout.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<L: RelayListener>(listener: L, relay_timeout: Duration) -> Self {
        Self::with_timeouts(listener, relay_timeout, relay_timeout)
    }

    /// Start a factory with a separate bound on each handshake
    pub fn with_timeouts<L: RelayListener>(
        listener: L,
        relay_timeout: Duration,
        handshake_timeout: Duration,
    ) -> Self {
        let registry = Arc::new(CorrelationRegistry::with_ttl(relay_timeout));
        let shutdown = CancellationToken::new();
        let local_pid = std::process::id();

        let accept_loop = AcceptLoop {
            listener,
            registry: registry.clone(),
            own_pid: local_pid,
            handshake_timeout,
            shutdown: shutdown.clone(),
        };
        let handle = tokio::spawn(accept_loop.run());

        Self {
            registry,
            relay_timeout,
            local_pid,
            shutdown,
            closed: AtomicBool::new(false),
            accept_loop: Mutex::new(Some(handle)),
        }
    }

    /// Start a factory on `listener` using configured timeouts
    pub fn with_config<L: RelayListener>(listener: L, config: &FactoryConfig) -> Self {
        Self::with_timeouts(listener, config.relay_timeout, config.handshake_timeout)
    }

    /// Bind the configured address and start a factory on it.
    ///
    /// Returns the address workers should dial, which differs from the
    /// configured one when an ephemeral TCP port was requested.
    pub async fn bind(config: &FactoryConfig) -> FactoryResult<(Self, ListenAddress)> {
        let listener = BoundListener::bind(&config.listen).await?;
        let address = listener.local_address()?;
        info!(address = %address, "worker factory listening");
        Ok((Self::with_config(listener, config), address))
    }

    /// Spawn `command` and wait for the process to connect back
    pub async fn new_worker(&self, command: Command) -> FactoryResult<Worker> {
        if self.is_closed() {
            return Err(FactoryError::AlreadyClosed);
        }

        let mut worker = Worker::new(command);
        let pid = worker.start()?;

        match self.wait_relay(pid, self.relay_timeout).await {
            Ok(relay) => {
                debug!(pid, peer = %relay.peer(), "relay attached to worker");
                worker.attach(relay);
                Ok(worker)
            }
            Err(e) => {
                warn!(pid, error = %e, "can't connect to worker");
                worker.mark_failed();
                Err(e)
            }
        }
    }

    /// Wait up to `timeout` for the relay of `pid`.
    ///
    /// The registry entry is removed whichever way the wait ends, including
    /// when this future is dropped. A relay that lands between the timer
    /// firing and that removal is still returned.
    pub async fn wait_relay(&self, pid: u32, timeout: Duration) -> FactoryResult<SocketRelay> {
        let channel = self.registry.get_or_create(pid);
        let mut receiver = channel
            .take_receiver()
            .ok_or(FactoryError::DuplicateWaiter { pid })?;
        let entry = PendingEntry {
            registry: &self.registry,
            pid,
        };

        match tokio::time::timeout(timeout, &mut receiver).await {
            Ok(Ok(relay)) => Ok(relay),
            Ok(Err(_)) => Err(FactoryError::ChannelClosed { pid }),
            Err(_) => {
                // Removal first: any delivery after this creates a new entry.
                drop(entry);
                receiver
                    .try_recv()
                    .map_err(|_| FactoryError::TimeoutError { pid, timeout })
            }
        }
    }

    /// Stop accepting connections.
    ///
    /// Waiters already blocked in `wait_relay` are left to time out.
    pub fn close(&self) -> FactoryResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(FactoryError::AlreadyClosed);
        }

        info!("closing worker factory");
        self.shutdown.cancel();
        Ok(())
    }

    /// Wait until the acceptance loop has exited and released the listener
    pub async fn wait_closed(&self) {
        let handle = self.accept_loop.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "acceptance loop terminated abnormally");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of pids with a pending registry entry
    pub fn pending(&self) -> usize {
        self.registry.len()
    }

    /// Pid workers must echo back as their parent
    pub fn local_pid(&self) -> u32 {
        self.local_pid
    }

    pub fn relay_timeout(&self) -> Duration {
        self.relay_timeout
    }
}

/// Registry entry owned by one `wait_relay` call, removed on drop
struct PendingEntry<'a> {
    registry: &'a CorrelationRegistry<SocketRelay>,
    pid: u32,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        self.registry.remove(self.pid);
    }
}

impl Drop for SocketFactory {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
