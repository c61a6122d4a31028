//! Error types for the relayq client library

/// Main error type for relayq client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// I/O failure on the underlying connection
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection-level failures (not connected, closed by peer)
    #[error("connection error: {message}")]
    Connection { message: String },

    /// A frame that would exceed the wire size limit
    #[error("frame too large")]
    FrameTooLarge,

    /// The server sent bytes that do not form a valid response
    #[error("bad server response")]
    BadResponse,

    /// The server rejected the request with an `Error` response
    #[error("server error response: {reason}")]
    Server { reason: String },

    /// The `Get` timeout expired with no message
    #[error("timeout expired")]
    Timeout,

    /// Request validation failed before anything was sent
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl ClientError {
    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a new server-rejection error
    pub fn server<S: Into<String>>(reason: S) -> Self {
        Self::Server {
            reason: reason.into(),
        }
    }

    /// Create a new invalid-request error
    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Check if this error is the `Get` timeout (as opposed to a
    /// transport failure)
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Check if this error is a connection or I/O error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Io(_))
    }
}
