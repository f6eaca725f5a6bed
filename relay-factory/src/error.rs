//! Error types for the worker factory

use std::time::Duration;

use relay_ipc::IpcError;
use thiserror::Error;

/// Errors raised while pairing an accepted connection with a process.
///
/// These never reach `new_worker` callers: the acceptance loop logs them and
/// drops the connection.
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Integrity error: expected parent {expected}, got {actual:?}")]
    IntegrityError { expected: u32, actual: Option<u32> },

    #[error("Handshake did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(#[from] IpcError),
}

/// Worker factory errors
#[derive(Error, Debug)]
pub enum FactoryError {
    #[error("Spawn error: {0}")]
    SpawnError(String),

    #[error("Relay timeout for [{pid}] after {timeout:?}")]
    TimeoutError { pid: u32, timeout: Duration },

    #[error("Relay channel for [{pid}] closed before delivery")]
    ChannelClosed { pid: u32 },

    #[error("Another caller is already waiting on pid {pid}")]
    DuplicateWaiter { pid: u32 },

    #[error("Factory is already closed")]
    AlreadyClosed,

    #[error("Bind error: {0}")]
    BindError(String),

    #[error("Relay error: {0}")]
    RelayError(#[from] IpcError),

    #[error("Worker has no attached relay")]
    NotAttached,

    #[error("Worker error: {0}")]
    WorkerError(String),
}

impl FactoryError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FactoryError::TimeoutError { .. })
    }

    /// Check if spawning a fresh worker could succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        match self {
            FactoryError::TimeoutError { .. } | FactoryError::ChannelClosed { .. } => true,
            FactoryError::RelayError(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result alias used across the crate
pub type FactoryResult<T> = Result<T, FactoryError>;
