//! Worker process handle

use std::fmt;

use bytes::Bytes;
use relay_ipc::{PayloadFlags, Relay, SocketRelay};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{FactoryError, FactoryResult};

/// Worker process lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Not started yet
    Inactive,
    /// Process running, no relay attached
    Spawned,
    /// Process running with an attached relay
    Attached,
    /// Pairing with a relay failed
    Failed,
    /// Process stopped
    Stopped,
}

/// A spawned worker process and its relay
pub struct Worker<R = SocketRelay> {
    command: Command,
    child: Option<Child>,
    pid: Option<u32>,
    relay: Option<R>,
    state: WorkerState,
}

impl<R: Relay> Worker<R> {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            child: None,
            pid: None,
            relay: None,
            state: WorkerState::Inactive,
        }
    }

    /// Spawn the process and return its pid.
    ///
    /// The child is killed if the worker is dropped, so a worker abandoned on a
    /// failed handshake does not leak its process.
    pub fn start(&mut self) -> FactoryResult<u32> {
        if self.state != WorkerState::Inactive {
            return Err(FactoryError::WorkerError(format!(
                "worker {} already started",
                self
            )));
        }

        self.command.kill_on_drop(true);
        let child = self
            .command
            .spawn()
            .map_err(|e| FactoryError::SpawnError(format!("can't start worker {}: {}", self, e)))?;

        // `id()` is `None` once the child has been reaped
        let pid = child.id().ok_or_else(|| {
            FactoryError::SpawnError(format!("can't obtain pid of worker {}", self))
        })?;

        debug!(pid, "worker process started");
        self.child = Some(child);
        self.pid = Some(pid);
        self.state = WorkerState::Spawned;
        Ok(pid)
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Take ownership of the relay paired with this process
    pub fn attach(&mut self, relay: R) {
        self.relay = Some(relay);
        self.state = WorkerState::Attached;
    }

    pub fn is_attached(&self) -> bool {
        self.relay.is_some()
    }

    pub(crate) fn mark_failed(&mut self) {
        self.state = WorkerState::Failed;
    }

    /// Send a payload to the worker and wait for its reply
    pub async fn exec(&mut self, body: &[u8]) -> FactoryResult<Bytes> {
        let relay = self.relay.as_mut().ok_or(FactoryError::NotAttached)?;
        relay.send(body, PayloadFlags::RAW).await?;

        let (reply, flags) = relay.receive().await?;
        if flags.contains(PayloadFlags::ERROR) {
            return Err(FactoryError::WorkerError(
                String::from_utf8_lossy(&reply).into_owned(),
            ));
        }
        if flags.contains(PayloadFlags::CONTROL) {
            return Err(FactoryError::WorkerError(
                "unexpected control frame in reply".to_string(),
            ));
        }

        Ok(reply)
    }

    /// Close the relay, then kill and reap the process
    pub async fn stop(&mut self) -> FactoryResult<()> {
        if let Some(mut relay) = self.relay.take() {
            if let Err(e) = relay.close().await {
                warn!(pid = ?self.pid, error = %e, "failed to close worker relay");
            }
        }

        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!(pid = ?self.pid, error = %e, "worker already exited");
            }
            child
                .wait()
                .await
                .map_err(|e| FactoryError::WorkerError(format!("failed to reap worker: {}", e)))?;
        }

        self.state = WorkerState::Stopped;
        Ok(())
    }
}

impl<R> fmt::Display for Worker<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let program = self.command.as_std().get_program().to_string_lossy();
        match self.pid {
            Some(pid) => write!(f, "({}) pid={}", program, pid),
            None => write!(f, "({}) pid=none", program),
        }
    }
}

impl<R> fmt::Debug for Worker<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("pid", &self.pid)
            .field("state", &self.state)
            .field("attached", &self.relay.is_some())
            .finish()
    }
}
