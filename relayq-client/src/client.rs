//! The relayq client.

use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::error::ClientError;
use crate::protocol::{
    ClientCodec, Frame, ServerInfo, CMD_GET, CMD_INFO, CMD_PUT, CMD_QUIT, MAX_GET_TIMEOUT,
    MAX_QUEUE_NAME_LEN, STATUS_ERROR, STATUS_OK, STATUS_TIMEOUT,
};
use crate::Result;

type Transport = Framed<TcpStream, ClientCodec>;

/// Asynchronous relayq client.
///
/// Holds one broker connection and serializes commands over it: each
/// logical request sends one frame and reads one frame back. The client
/// is safe to share behind an `Arc`; concurrent callers queue on the
/// internal mutex.
#[derive(Debug)]
pub struct Client {
    transport: Mutex<Option<Transport>>,
}

impl Client {
    /// Creates a disconnected client.
    pub fn new() -> Self {
        Self {
            transport: Mutex::new(None),
        }
    }

    /// Connects to the broker at `addr` (see
    /// [`DEFAULT_ADDR`](crate::DEFAULT_ADDR)). An existing connection is
    /// replaced.
    pub async fn connect(&self, addr: &str) -> Result<()> {
        let socket = TcpStream::connect(addr).await?;
        debug!("connected to broker at {}", addr);
        *self.transport.lock().await = Some(Framed::new(socket, ClientCodec::new()));
        Ok(())
    }

    /// Sends `Quit` and drops the connection. A no-op when already
    /// disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        if let Some(mut transport) = self.transport.lock().await.take() {
            // Quit is fire-and-forget; the broker sends no reply.
            let _ = transport.send(vec![Bytes::from_static(CMD_QUIT)]).await;
        }
        Ok(())
    }

    async fn command(&self, request: Frame) -> Result<Frame> {
        let mut guard = self.transport.lock().await;
        let transport = guard
            .as_mut()
            .ok_or_else(|| ClientError::connection("client is not connected"))?;

        transport.send(request).await?;

        match transport.next().await {
            Some(response) => Ok(response?),
            None => Err(ClientError::connection("connection closed by server")),
        }
    }

    /// Appends `message` to the tail of `queue`.
    pub async fn put(&self, queue: impl AsRef<[u8]>, message: impl Into<Bytes>) -> Result<()> {
        let queue = queue.as_ref();
        if queue.len() > MAX_QUEUE_NAME_LEN {
            return Err(ClientError::invalid_request(
                "queue name is longer than MAX_QUEUE_NAME_LEN",
            ));
        }

        let request = vec![
            Bytes::from_static(CMD_PUT),
            Bytes::copy_from_slice(queue),
            message.into(),
        ];
        let response = self.command(request).await?;

        match response.as_slice() {
            [status, ..] if status.as_ref() == STATUS_OK => Ok(()),
            [status, reason, ..] if status.as_ref() == STATUS_ERROR => {
                Err(ClientError::server(String::from_utf8_lossy(reason)))
            }
            _ => Err(ClientError::BadResponse),
        }
    }

    /// Receives the next message from `queue`, waiting up to `timeout`
    /// for one to arrive.
    ///
    /// Returns [`ClientError::Timeout`] if the queue stayed empty for the
    /// whole window; `timeout` must not exceed
    /// [`MAX_GET_TIMEOUT`](crate::MAX_GET_TIMEOUT).
    pub async fn get(&self, queue: impl AsRef<[u8]>, timeout: Duration) -> Result<Bytes> {
        let queue = queue.as_ref();
        if queue.len() > MAX_QUEUE_NAME_LEN {
            return Err(ClientError::invalid_request(
                "queue name is longer than MAX_QUEUE_NAME_LEN",
            ));
        }
        if timeout > MAX_GET_TIMEOUT {
            return Err(ClientError::invalid_request(
                "timeout is larger than MAX_GET_TIMEOUT",
            ));
        }

        let timeout_ms = timeout.as_millis().to_string();
        let request = vec![
            Bytes::from_static(CMD_GET),
            Bytes::copy_from_slice(queue),
            Bytes::from(timeout_ms.into_bytes()),
        ];
        let response = self.command(request).await?;

        match response.as_slice() {
            [status, payload, ..] if status.as_ref() == STATUS_OK => Ok(payload.clone()),
            [status, ..] if status.as_ref() == STATUS_TIMEOUT => Err(ClientError::Timeout),
            [status, reason, ..] if status.as_ref() == STATUS_ERROR => {
                Err(ClientError::server(String::from_utf8_lossy(reason)))
            }
            _ => Err(ClientError::BadResponse),
        }
    }

    /// Fetches broker statistics.
    pub async fn info(&self) -> Result<ServerInfo> {
        let response = self.command(vec![Bytes::from_static(CMD_INFO)]).await?;

        match response.as_slice() {
            [status, payload, ..] if status.as_ref() == STATUS_OK => {
                serde_json::from_slice(payload).map_err(|_| ClientError::BadResponse)
            }
            [status, reason, ..] if status.as_ref() == STATUS_ERROR => {
                Err(ClientError::server(String::from_utf8_lossy(reason)))
            }
            _ => Err(ClientError::BadResponse),
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
