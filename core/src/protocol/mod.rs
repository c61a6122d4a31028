//! Wire protocol: frame type, protocol limits and the frame codec.
//!
//! Every message on a relayq socket is one *frame*: a big-endian `u32`
//! body length followed by a body holding zero or more items, each item
//! being a `u32` length prefix and that many opaque bytes. There is no
//! item count; decoding walks the body until it is exhausted.
//!
//! Requests are dispatched on the first item (`Put`, `Get`, `Info`,
//! `Quit`); responses start with `OK`, `Error` or `Timeout`. All tokens
//! are US-ASCII and case-sensitive.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

mod codec;
#[cfg(test)]
mod tests;

pub use codec::{FrameCodec, FrameCodecError};

/// Default TCP address for the server listener.
pub const DEFAULT_ADDR: &str = "127.0.0.1:47774";

/// Maximum queue name length in bytes.
pub const MAX_QUEUE_NAME_LEN: usize = 1024;

/// Maximum message payload length in bytes (32 MiB).
pub const MAX_MESSAGE_LEN: usize = 32 * 1024 * 1024;

/// Maximum frame body length: sized for the largest legal `Put` request
/// (command token, maximum queue name, maximum payload, plus the item
/// length prefixes).
pub const MAX_FRAME_LEN: usize = 4 + 3 + 4 + MAX_QUEUE_NAME_LEN + 4 + MAX_MESSAGE_LEN;

/// Maximum `Get` timeout in milliseconds (1 hour).
pub const MAX_GET_TIMEOUT_MS: u64 = 60 * 60 * 1000;

/// A wire frame: zero or more opaque byte-string items.
pub type Frame = Vec<Bytes>;

/// Request command tokens.
pub const CMD_PUT: &[u8] = b"Put";
pub const CMD_GET: &[u8] = b"Get";
pub const CMD_INFO: &[u8] = b"Info";
pub const CMD_QUIT: &[u8] = b"Quit";

/// Response status tokens.
pub const STATUS_OK: &[u8] = b"OK";
pub const STATUS_ERROR: &[u8] = b"Error";
pub const STATUS_TIMEOUT: &[u8] = b"Timeout";

/// `Error` response reasons.
pub const ERR_BAD_PARAMS: &[u8] = b"REQUEST_BAD_PARAMS";
pub const ERR_BAD_QUEUE_NAME: &[u8] = b"REQUEST_BAD_QUEUE_NAME";
pub const ERR_BAD_TIMEOUT: &[u8] = b"REQUEST_BAD_TIMEOUT";
pub const ERR_UNKNOWN_COMMAND: &[u8] = b"REQUEST_UNKNOWN_COMMAND";

/// Server statistics returned by the `Info` command.
///
/// Per-queue lengths are sampled one queue at a time, so the totals can
/// skew against each other under concurrent traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(rename = "NumConnections")]
    pub num_connections: usize,
    #[serde(rename = "NumQueues")]
    pub num_queues: usize,
    #[serde(rename = "NumMessages")]
    pub num_messages: usize,
    #[serde(rename = "Queues")]
    pub queues: HashMap<String, QueueInfo>,
}

/// Statistics for a single queue inside [`ServerInfo`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInfo {
    #[serde(rename = "NumMessages")]
    pub num_messages: usize,
}
