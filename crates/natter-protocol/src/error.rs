//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur during protocol operations.
///
/// Every variant is terminal for the connection it occurred on: a failed
/// read or write leaves the stream in an unknown position and the only
/// recovery is to close. Frames that merely carry an unrecognized payload
/// are not errors; they decode as absent.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame payload exceeds the maximum allowed size.
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: u32, max: u32 },

    /// Failed to serialize a command to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error during read or write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream.
    #[error("connection closed by peer")]
    ConnectionClosed,
}
