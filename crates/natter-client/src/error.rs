//! Client error types.

use thiserror::Error;

use natter_protocol::ProtocolError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connecting to the server failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// IO error on the established connection.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol/framing error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Operation requires a connected session.
    #[error("session is not connected")]
    NotConnected,
}

impl ClientError {
    /// True when the error is the peer going away rather than a local fault.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::ConnectionClosed))
    }
}
