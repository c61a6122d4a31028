//! # relayq Client Library
//!
//! Async client for the relayq message-queue broker.
//!
//! The client holds one TCP connection and runs one command at a time
//! over it: each request is send-one-frame-then-read-one-frame. The
//! broker never pushes unsolicited frames, so this is all the protocol
//! needs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use relayq_client::{Client, DEFAULT_ADDR};
//!
//! #[tokio::main]
//! async fn main() -> relayq_client::Result<()> {
//!     let client = Client::new();
//!     client.connect(DEFAULT_ADDR).await?;
//!
//!     client.put("jobs", "hello").await?;
//!     let message = client.get("jobs", Duration::from_secs(5)).await?;
//!     println!("received: {}", String::from_utf8_lossy(&message));
//!
//!     client.disconnect().await
//! }
//! ```

pub mod client;
pub mod error;
pub mod protocol;

pub use client::Client;
pub use error::ClientError;
pub use protocol::{
    QueueInfo, ServerInfo, DEFAULT_ADDR, MAX_GET_TIMEOUT, MAX_MESSAGE_LEN, MAX_QUEUE_NAME_LEN,
};

/// Client library result type
pub type Result<T> = std::result::Result<T, ClientError>;
