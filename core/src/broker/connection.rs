use std::net::SocketAddr;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, Duration};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::protocol::{
    Frame, FrameCodec, FrameCodecError, CMD_GET, CMD_INFO, CMD_PUT, CMD_QUIT, ERR_BAD_PARAMS,
    ERR_BAD_QUEUE_NAME, ERR_BAD_TIMEOUT, ERR_UNKNOWN_COMMAND, MAX_GET_TIMEOUT_MS,
    MAX_QUEUE_NAME_LEN, STATUS_ERROR, STATUS_OK, STATUS_TIMEOUT,
};
use crate::queue::MessageQueue;

use super::server::Server;

/// Stop handle kept in the server's connection set.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionHandle {
    cancel: CancellationToken,
}

impl ConnectionHandle {
    /// Fires the connection's cancel signal. Idempotent; the connection
    /// task unwinds its current operation and drops the socket.
    pub(crate) fn stop(&self) {
        self.cancel.cancel();
    }
}

/// One accepted client connection: a request loop over a framed socket
/// plus the cancel signal observed by every blocking operation.
pub(crate) struct Connection {
    server: Server,
    id: u64,
    peer_addr: SocketAddr,
    framed: Framed<TcpStream, FrameCodec>,
    cancel: CancellationToken,
}

impl Connection {
    pub(crate) fn new(server: Server, id: u64, socket: TcpStream, peer_addr: SocketAddr) -> Self {
        Self {
            server,
            id,
            peer_addr,
            framed: Framed::new(socket, FrameCodec::new()),
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            cancel: self.cancel.clone(),
        }
    }

    /// Request loop: one frame in, dispatch on the first item, at most
    /// one frame out. Responses go out in request order.
    pub(crate) async fn run(mut self) {
        while !self.cancel.is_cancelled() {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => return,
                next = self.framed.next() => match next {
                    Some(Ok(frame)) => frame,
                    Some(Err(err)) => {
                        if !self.cancel.is_cancelled() {
                            error!("failed to read frame ({}): {}", self.peer_addr, err);
                            self.cancel.cancel();
                        }
                        return;
                    }
                    None => {
                        debug!("client disconnected: {}", self.peer_addr);
                        self.cancel.cancel();
                        return;
                    }
                },
            };

            match frame.first().map(Bytes::as_ref) {
                Some(CMD_GET) => self.handle_get(&frame).await,
                Some(CMD_PUT) => self.handle_put(&frame).await,
                Some(CMD_INFO) => self.handle_info().await,
                Some(CMD_QUIT) => self.cancel.cancel(),
                _ => self.handle_unknown().await,
            }
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<(), FrameCodecError> {
        self.framed.send(frame).await
    }

    /// Sends a response, treating a write failure as a transport error
    /// that stops the connection.
    async fn send_or_stop(&mut self, frame: Frame) {
        if let Err(err) = self.send(frame).await {
            if !self.cancel.is_cancelled() {
                error!("failed to write frame ({}): {}", self.peer_addr, err);
                self.cancel.cancel();
            }
        }
    }

    async fn send_error(&mut self, reason: &'static [u8]) {
        self.send_or_stop(vec![
            Bytes::from_static(STATUS_ERROR),
            Bytes::from_static(reason),
        ])
        .await;
    }

    // Request handler: Put <queue> <message>
    async fn handle_put(&mut self, frame: &Frame) {
        if frame.len() < 3 {
            return self.send_error(ERR_BAD_PARAMS).await;
        }

        let name = frame[1].clone();
        if name.len() > MAX_QUEUE_NAME_LEN {
            return self.send_error(ERR_BAD_QUEUE_NAME).await;
        }
        let payload = frame[2].clone();

        // A registry failure means the server is shutting down and the
        // cancel signal is about to fire.
        let Ok(queue) = self.server.get_queue(&name) else {
            return;
        };

        tokio::select! {
            _ = self.cancel.cancelled() => {}
            enqueued = queue.enqueue(payload) => {
                if enqueued.is_ok() {
                    self.send_or_stop(vec![Bytes::from_static(STATUS_OK)]).await;
                }
            }
        }
    }

    // Request handler: Get <queue> [<timeout-ms>]
    async fn handle_get(&mut self, frame: &Frame) {
        if frame.len() < 2 {
            return self.send_error(ERR_BAD_PARAMS).await;
        }

        let name = frame[1].clone();
        if name.len() > MAX_QUEUE_NAME_LEN {
            return self.send_error(ERR_BAD_QUEUE_NAME).await;
        }

        let mut timeout_ms: u64 = 1;
        if let Some(raw) = frame.get(2) {
            timeout_ms = match std::str::from_utf8(raw).ok().and_then(|s| s.parse().ok()) {
                Some(ms) => ms,
                None => return self.send_error(ERR_BAD_TIMEOUT).await,
            };
        }
        if timeout_ms > MAX_GET_TIMEOUT_MS {
            return self.send_error(ERR_BAD_TIMEOUT).await;
        }
        // Sub-millisecond polls get a 1 ms grace period.
        let timeout = Duration::from_millis(timeout_ms.max(1));

        let Ok(queue) = self.server.get_queue(&name) else {
            return;
        };
        let mut ticket = match queue.dequeue().await {
            Ok(ticket) => ticket,
            Err(_) => return,
        };

        tokio::select! {
            _ = self.cancel.cancelled() => {
                // Unregister; a payload handed over concurrently goes
                // back to the head.
                ticket.close();
                if let Ok(payload) = ticket.try_recv() {
                    let _ = queue.requeue(payload).await;
                }
            }
            received = &mut ticket => match received {
                Ok(payload) => self.deliver(&queue, payload).await,
                Err(_) => {} // queue stopped underneath us
            },
            _ = sleep(timeout) => {
                ticket.close();
                // The hand-off may have won the race against the timer.
                match ticket.try_recv() {
                    Ok(payload) => self.deliver(&queue, payload).await,
                    Err(_) => {
                        self.send_or_stop(vec![Bytes::from_static(STATUS_TIMEOUT)]).await
                    }
                }
            }
        }
    }

    /// Sends a dequeued payload to the client. If the transport refuses
    /// the response, the payload is reinserted at the head of the queue
    /// so another consumer can receive it.
    async fn deliver(&mut self, queue: &MessageQueue, payload: Bytes) {
        let response = vec![Bytes::from_static(STATUS_OK), payload.clone()];
        if let Err(err) = self.send(response).await {
            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = queue.requeue(payload) => {}
            }
            if !self.cancel.is_cancelled() {
                error!("failed to write frame ({}): {}", self.peer_addr, err);
                self.cancel.cancel();
            }
        }
    }

    // Request handler: Info
    async fn handle_info(&mut self) {
        let info = self.server.info().await;

        match serde_json::to_vec(&info) {
            Ok(encoded) => {
                self.send_or_stop(vec![Bytes::from_static(STATUS_OK), Bytes::from(encoded)])
                    .await
            }
            Err(err) => {
                error!("failed to encode server info ({}): {}", self.peer_addr, err);
                self.cancel.cancel();
            }
        }
    }

    // Request handler: unrecognized or empty command
    async fn handle_unknown(&mut self) {
        let _ = self
            .send(vec![
                Bytes::from_static(STATUS_ERROR),
                Bytes::from_static(ERR_UNKNOWN_COMMAND),
            ])
            .await;
        self.cancel.cancel();
    }
}
