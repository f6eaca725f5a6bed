//! Pid handshake run on every accepted connection.
//!
//! The supervisor probes with its own pid; the worker answers with its pid and
//! echoes the supervisor pid as `parent`. [`fetch_pid`] is the supervisor side,
//! [`announce`] the worker side.

use relay_ipc::{ControlMessage, PayloadFlags, Relay};
use tracing::trace;

use crate::error::HandshakeError;

/// Send a control message over the relay
pub async fn send_control<R>(relay: &mut R, message: &ControlMessage) -> Result<(), HandshakeError>
where
    R: Relay + ?Sized,
{
    let body = message.to_bytes()?;
    relay.send(&body, PayloadFlags::CONTROL).await?;
    Ok(())
}

/// Receive the next message and decode it as a control message
pub async fn receive_control<R>(relay: &mut R) -> Result<ControlMessage, HandshakeError>
where
    R: Relay + ?Sized,
{
    let (body, flags) = relay.receive().await?;
    if !flags.contains(PayloadFlags::CONTROL) {
        return Err(HandshakeError::ProtocolError(
            "unexpected response, `control` header is missing".to_string(),
        ));
    }

    ControlMessage::from_bytes(&body).map_err(|e| HandshakeError::DecodeError(e.to_string()))
}

/// Probe the peer and return the pid it reports.
///
/// Fails with an integrity error when the peer does not echo `own_pid` as its
/// parent, which rejects connections belonging to another supervisor.
pub async fn fetch_pid<R>(relay: &mut R, own_pid: u32) -> Result<u32, HandshakeError>
where
    R: Relay + ?Sized,
{
    send_control(relay, &ControlMessage::probe(own_pid)).await?;

    let link = receive_control(relay).await?;
    if link.parent != Some(own_pid) {
        return Err(HandshakeError::IntegrityError {
            expected: own_pid,
            actual: link.parent,
        });
    }

    trace!(pid = link.pid, parent = own_pid, "handshake complete");
    Ok(link.pid)
}

/// Answer a supervisor probe from the worker side.
///
/// Returns the supervisor pid carried by the probe.
pub async fn announce<R>(relay: &mut R, own_pid: u32) -> Result<u32, HandshakeError>
where
    R: Relay + ?Sized,
{
    let probe = receive_control(relay).await?;
    send_control(relay, &ControlMessage::response(own_pid, probe.pid)).await?;
    Ok(probe.pid)
}
