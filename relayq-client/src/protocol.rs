//! Wire protocol types for relayq client communication.
//!
//! A frame is a big-endian `u32` body length followed by zero or more
//! items, each a `u32` length prefix and that many opaque bytes.
//! Requests lead with a command token (`Put`, `Get`, `Info`, `Quit`);
//! responses lead with `OK`, `Error` or `Timeout`.

use std::collections::HashMap;
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ClientError;

/// Default TCP address of a local broker.
pub const DEFAULT_ADDR: &str = "127.0.0.1:47774";

/// Maximum queue name length in bytes.
pub const MAX_QUEUE_NAME_LEN: usize = 1024;

/// Maximum message payload length in bytes (32 MiB).
pub const MAX_MESSAGE_LEN: usize = 32 * 1024 * 1024;

/// Maximum frame body length accepted by the broker.
pub const MAX_FRAME_LEN: usize = 4 + 3 + 4 + MAX_QUEUE_NAME_LEN + 4 + MAX_MESSAGE_LEN;

/// Maximum timeout accepted for [`Client::get`](crate::Client::get).
pub const MAX_GET_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// A wire frame: zero or more opaque byte-string items.
pub type Frame = Vec<Bytes>;

pub(crate) const CMD_PUT: &[u8] = b"Put";
pub(crate) const CMD_GET: &[u8] = b"Get";
pub(crate) const CMD_INFO: &[u8] = b"Info";
pub(crate) const CMD_QUIT: &[u8] = b"Quit";

pub(crate) const STATUS_OK: &[u8] = b"OK";
pub(crate) const STATUS_ERROR: &[u8] = b"Error";
pub(crate) const STATUS_TIMEOUT: &[u8] = b"Timeout";

/// Broker statistics returned by [`Client::info`](crate::Client::info).
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

/// Per-queue statistics inside [`ServerInfo`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInfo {
    #[serde(rename = "NumMessages")]
    pub num_messages: usize,
}

/// Frame codec for `tokio_util::codec::Framed`.
#[derive(Debug, Default)]
pub struct ClientCodec;

impl ClientCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for ClientCodec {
    type Item = Frame;
    type Error = ClientError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ClientError> {
        if src.len() < 4 {
            return Ok(None);
        }

        let body_len = {
            let mut prefix = &src[..4];
            prefix.get_u32() as usize
        };

        if body_len > MAX_FRAME_LEN {
            return Err(ClientError::FrameTooLarge);
        }

        if src.len() < 4 + body_len {
            src.reserve(4 + body_len - src.len());
            return Ok(None);
        }

        src.advance(4);
        let mut body = src.split_to(body_len).freeze();

        let mut frame = Frame::new();
        while !body.is_empty() {
            if body.len() < 4 {
                return Err(ClientError::BadResponse);
            }
            let item_len = body.get_u32() as usize;
            if body.len() < item_len {
                return Err(ClientError::BadResponse);
            }
            frame.push(body.split_to(item_len));
        }

        Ok(Some(frame))
    }
}

impl Encoder<Frame> for ClientCodec {
    type Error = ClientError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), ClientError> {
        let body_len: usize = frame.iter().map(|item| 4 + item.len()).sum();
        if body_len > MAX_FRAME_LEN {
            return Err(ClientError::FrameTooLarge);
        }

        dst.reserve(4 + body_len);
        dst.put_u32(body_len as u32);
        for item in &frame {
            dst.put_u32(item.len() as u32);
            dst.extend_from_slice(item);
        }

        Ok(())
    }
}
