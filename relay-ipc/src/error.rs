//! IPC error types

use thiserror::Error;

/// IPC error types
#[derive(Debug, Error)]
pub enum IpcError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Connection closed by the peer
    #[error("Connection closed")]
    ConnectionClosed,

    /// Frame header announced a body larger than the codec accepts
    #[error("Frame too large: {size} bytes exceeds maximum of {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Frame header carried flag bits this protocol does not define
    #[error("Invalid frame flags: {0:#04x}")]
    InvalidFlags(u8),
}

impl IpcError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, IpcError::IoError(_) | IpcError::ConnectionClosed)
    }
}

impl From<std::io::Error> for IpcError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset => IpcError::ConnectionClosed,
            _ => IpcError::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for IpcError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            IpcError::IoError(err.to_string())
        } else if err.is_data() || err.is_syntax() || err.is_eof() {
            IpcError::DeserializationError(err.to_string())
        } else {
            IpcError::SerializationError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(IpcError::IoError("network error".to_string()).is_retryable());
        assert!(IpcError::ConnectionClosed.is_retryable());
        assert!(!IpcError::InvalidFlags(0x80).is_retryable());
        assert!(!IpcError::FrameTooLarge { size: 10, max: 5 }.is_retryable());
    }

    #[test]
    fn test_io_error_mapping() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(IpcError::from(eof), IpcError::ConnectionClosed));

        let other = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(IpcError::from(other), IpcError::IoError(_)));
    }

    #[test]
    fn test_json_error_mapping() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(
            IpcError::from(err),
            IpcError::DeserializationError(_)
        ));
    }
}
