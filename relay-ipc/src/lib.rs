//! Relay protocol for supervisor/worker communication
//!
//! This crate provides the framed message protocol and the duplex relay
//! abstraction used between a supervising process and the worker processes
//! that dial back into it.

pub mod codec;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use codec::{FrameCodec, MAX_FRAME_SIZE};
pub use error::IpcError;
pub use protocol::{ControlMessage, Frame, PayloadFlags};
pub use transport::{Relay, RelayStream, SocketRelay};
