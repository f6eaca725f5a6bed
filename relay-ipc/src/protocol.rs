//! Relay protocol definitions and message types

use bitflags::bitflags;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::IpcError;

bitflags! {
    /// Flags carried in every frame header
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PayloadFlags: u8 {
        /// Protocol management message (handshake and friends)
        const CONTROL = 0x01;
        /// Opaque application payload
        const RAW = 0x02;
        /// Payload describes an error raised by the sender
        const ERROR = 0x04;
    }
}

/// Control message exchanged while pairing a connection with a process.
///
/// The supervisor sends its own pid as a probe. The worker answers with its
/// own pid and echoes the supervisor pid back in `parent`. Unknown fields are
/// ignored so peers can extend the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub pid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<u32>,
}

impl ControlMessage {
    /// Probe sent by the accepting side
    pub fn probe(pid: u32) -> Self {
        Self { pid, parent: None }
    }

    /// Response sent by a worker to a supervisor's probe
    pub fn response(pid: u32, parent: u32) -> Self {
        Self {
            pid,
            parent: Some(parent),
        }
    }

    /// Encode as a JSON body
    pub fn to_bytes(&self) -> Result<Bytes, IpcError> {
        let body = serde_json::to_vec(self)
            .map_err(|e| IpcError::SerializationError(e.to_string()))?;
        Ok(Bytes::from(body))
    }

    /// Decode from a JSON body
    pub fn from_bytes(body: &[u8]) -> Result<Self, IpcError> {
        serde_json::from_slice(body).map_err(|e| IpcError::DeserializationError(e.to_string()))
    }
}

/// A single message on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub flags: PayloadFlags,
    pub body: Bytes,
}

impl Frame {
    pub fn new(flags: PayloadFlags, body: impl Into<Bytes>) -> Self {
        Self {
            flags,
            body: body.into(),
        }
    }

    /// Control frame carrying the given message
    pub fn control(message: &ControlMessage) -> Result<Self, IpcError> {
        Ok(Self::new(PayloadFlags::CONTROL, message.to_bytes()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_omits_parent() {
        let json = serde_json::to_string(&ControlMessage::probe(42)).unwrap();
        assert_eq!(json, r#"{"pid":42}"#);
    }

    #[test]
    fn test_response_wire_shape() {
        let body = ControlMessage::response(5678, 100).to_bytes().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, serde_json::json!({"pid": 5678, "parent": 100}));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let message =
            ControlMessage::from_bytes(br#"{"pid":7,"parent":3,"version":"2.1"}"#).unwrap();
        assert_eq!(message, ControlMessage::response(7, 3));
    }

    #[test]
    fn test_malformed_body_rejected() {
        assert!(matches!(
            ControlMessage::from_bytes(b"pid=7"),
            Err(IpcError::DeserializationError(_))
        ));
        assert!(matches!(
            ControlMessage::from_bytes(br#"{"parent":3}"#),
            Err(IpcError::DeserializationError(_))
        ));
        assert!(matches!(
            ControlMessage::from_bytes(br#"{"pid":-1}"#),
            Err(IpcError::DeserializationError(_))
        ));
    }

    #[test]
    fn test_control_frame() {
        let frame = Frame::control(&ControlMessage::probe(1)).unwrap();
        assert_eq!(frame.flags, PayloadFlags::CONTROL);
        assert_eq!(&frame.body[..], br#"{"pid":1}"#);
    }
}
