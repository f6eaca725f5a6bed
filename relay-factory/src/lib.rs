//! Relay worker factory
//!
//! Spawns worker processes and pairs each one with the relay connection it
//! opens back to the factory's listening socket. Pairing goes through a pid
//! handshake and a correlation registry shared between the acceptance loop
//! and callers of [`SocketFactory::new_worker`].

mod acceptor;
pub mod error;
pub mod factory;
pub mod handshake;
pub mod listener;
pub mod registry;
pub mod worker;

// Re-export main types
pub use error::{FactoryError, FactoryResult, HandshakeError};
pub use factory::SocketFactory;
pub use handshake::{announce, fetch_pid};
pub use listener::{connect, BoundListener, RelayListener};
pub use registry::{CorrelationRegistry, RelayChannel};
pub use worker::{Worker, WorkerState};

// Re-export relay types for convenience
pub use relay_ipc::{ControlMessage, IpcError, PayloadFlags, Relay, SocketRelay};
