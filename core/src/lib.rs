//! # relayq Core Library
//!
//! relayq is a minimal in-memory message-queue broker. Clients talk to it
//! over TCP with a length-prefixed binary frame protocol and multiplex any
//! number of named FIFO queues on a single connection.
//!
//! ## Architecture
//!
//! - [`protocol`] - wire frame type, limits and the frame codec
//! - [`queue`] - per-queue actor task owning the payload FIFO
//! - [`broker`] - TCP server, connection handling and queue registry
//!
//! Each accepted connection runs in its own task; each queue is owned by
//! exactly one actor task. A `Get` blocks until a message arrives, the
//! requested timeout expires, or the connection is cancelled. A message
//! whose response could not be written back to the consumer is reinserted
//! at the head of its queue, so it is never lost to a crashed consumer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relayq::{Server, DEFAULT_ADDR};
//!
//! #[tokio::main]
//! async fn main() -> relayq::Result<()> {
//!     let server = Server::new();
//!     server.listen_and_serve(DEFAULT_ADDR).await
//! }
//! ```
//!
//! The broker keeps no state outside process memory: queues are created
//! lazily on first reference and dropped on shutdown.

pub mod broker;
pub mod protocol;
pub mod queue;

pub use broker::{Server, ServerState};
pub use protocol::{QueueInfo, ServerInfo, DEFAULT_ADDR};
pub use queue::MessageQueue;

use thiserror::Error;

/// relayq error types
#[derive(Debug, Error)]
pub enum RelayqError {
    /// Socket and listener failures
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire framing failures (oversize or malformed frames)
    #[error("frame codec error: {0}")]
    Codec(#[from] protocol::FrameCodecError),

    /// JSON serialization failures (Info payload)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol violations observed by the `info` CLI path
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The operation requires a server state the server is not in
    #[error("insufficient server state")]
    InsufficientServerState,

    /// The target queue has been stopped
    #[error("queue is stopped")]
    QueueStopped,
}

/// Result type alias for relayq operations
pub type Result<T> = std::result::Result<T, RelayqError>;
