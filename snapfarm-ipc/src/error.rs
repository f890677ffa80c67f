//! Control-plane error types

use thiserror::Error;

/// Control-plane error types
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

    /// Connection closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Protocol version mismatch
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    ProtocolVersionMismatch { expected: u32, actual: u32 },
}

impl IpcError {
    /// Check if this error is retryable (reconnect and carry on)
    pub fn is_retryable(&self) -> bool {
        matches!(self, IpcError::IoError(_) | IpcError::ConnectionClosed)
    }

    /// Check if this error indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, IpcError::ProtocolVersionMismatch { .. })
    }
}

impl From<std::io::Error> for IpcError {
    fn from(err: std::io::Error) -> Self {
        IpcError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for IpcError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            IpcError::IoError(err.to_string())
        } else if err.is_data() {
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
        assert!(!IpcError::ProtocolVersionMismatch { expected: 1, actual: 2 }.is_retryable());
    }

    #[test]
    fn test_error_fatal() {
        assert!(IpcError::ProtocolVersionMismatch { expected: 1, actual: 2 }.is_fatal());
        assert!(!IpcError::IoError("network error".to_string()).is_fatal());
        assert!(!IpcError::DeserializationError("bad line".to_string()).is_fatal());
    }
}
