use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::protocol::{QueueInfo, ServerInfo};
use crate::queue::MessageQueue;
use crate::{RelayqError, Result};

use super::connection::{Connection, ConnectionHandle};

/// Server lifecycle states. Transitions are monotone:
/// `New -> Active -> Stopped`, with no reuse of a stopped server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    New,
    Active,
    Stopped,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::New => "new",
            ServerState::Active => "active",
            ServerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// The relayq broker.
///
/// `Server` is a cheap handle over shared state; clone it freely into
/// tasks and signal handlers. The queue registry and the connection set
/// are populated only while the server is [`ServerState::Active`].
#[derive(Debug, Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    shared: RwLock<Shared>,
    shutdown: CancellationToken,
}

#[derive(Debug)]
struct Shared {
    state: ServerState,
    queues: HashMap<Bytes, MessageQueue>,
    connections: HashMap<u64, ConnectionHandle>,
    next_connection_id: u64,
}

impl Server {
    /// Creates a server in state [`ServerState::New`].
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                shared: RwLock::new(Shared {
                    state: ServerState::New,
                    queues: HashMap::new(),
                    connections: HashMap::new(),
                    next_connection_id: 0,
                }),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Binds the TCP address `addr` and serves client requests until the
    /// server is stopped.
    pub async fn listen_and_serve(&self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await.map_err(|err| {
            error!("tcp listen on {} failed: {}", addr, err);
            err
        })?;
        self.serve(listener).await
    }

    /// Accepts incoming connections on `listener` and serves client
    /// requests until the server is stopped. Fails with
    /// [`RelayqError::InsufficientServerState`] unless the server is in
    /// state [`ServerState::New`].
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        {
            let mut shared = self.inner.shared.write();
            if shared.state != ServerState::New {
                return Err(RelayqError::InsufficientServerState);
            }
            shared.state = ServerState::Active;
        }

        if let Ok(addr) = listener.local_addr() {
            info!("server started: {}", addr);
        }

        let result = self.accept_loop(&listener).await;

        // Serve owns the lifecycle: whatever unblocked the loop, make
        // sure the stop cascade has run before returning.
        let _ = self.stop();

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            let accepted = tokio::select! {
                _ = self.inner.shutdown.cancelled() => return Ok(()),
                accepted = listener.accept() => accepted,
            };

            let (socket, peer_addr) = match accepted {
                Ok(pair) => pair,
                Err(err) if is_temporary(&err) => {
                    let delay = Duration::from_secs(1);
                    warn!("listener accept temporary error: {} (retrying in {:?})", err, delay);
                    tokio::select! {
                        _ = self.inner.shutdown.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => continue,
                    }
                }
                Err(err) => {
                    error!("listener accept error: {}", err);
                    return Err(err.into());
                }
            };

            let connection = {
                let mut shared = self.inner.shared.write();
                if shared.state != ServerState::Active {
                    // Raced with stop; drop the socket and bow out.
                    return Ok(());
                }
                let id = shared.next_connection_id;
                shared.next_connection_id += 1;

                let connection = Connection::new(self.clone(), id, socket, peer_addr);
                shared.connections.insert(id, connection.handle());
                connection
            };

            info!("client connected: {}", peer_addr);

            let server = self.clone();
            let id = connection.id();
            tokio::spawn(async move {
                connection.run().await;
                server.remove_connection(id);
            });
        }
    }

    /// Stops the server: fires the shutdown signal, then stops every live
    /// connection and queue and clears both sets. Exactly one caller
    /// succeeds; any other observes
    /// [`RelayqError::InsufficientServerState`]. Non-blocking, so it is
    /// safe to call from any task, including a signal handler.
    pub fn stop(&self) -> Result<()> {
        let (connections, queues) = {
            let mut shared = self.inner.shared.write();
            if shared.state != ServerState::Active {
                return Err(RelayqError::InsufficientServerState);
            }
            shared.state = ServerState::Stopped;
            (
                std::mem::take(&mut shared.connections),
                std::mem::take(&mut shared.queues),
            )
        };

        self.inner.shutdown.cancel();

        for connection in connections.values() {
            connection.stop();
        }
        for queue in queues.values() {
            queue.stop();
        }

        info!("server stopped");
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        self.inner.shared.read().state
    }

    /// Snapshot of connection and queue statistics.
    ///
    /// The registry is snapshotted under the read lock; queue lengths are
    /// then sampled one actor at a time, so per-queue numbers can skew
    /// against each other.
    pub async fn info(&self) -> ServerInfo {
        let (num_connections, queues) = {
            let shared = self.inner.shared.read();
            let queues: Vec<(Bytes, MessageQueue)> = shared
                .queues
                .iter()
                .map(|(name, queue)| (name.clone(), queue.clone()))
                .collect();
            (shared.connections.len(), queues)
        };

        let mut info = ServerInfo {
            num_connections,
            num_queues: queues.len(),
            num_messages: 0,
            queues: HashMap::new(),
        };

        for (name, queue) in queues {
            let num_messages = queue.len().await.unwrap_or(0);
            info.num_messages += num_messages;
            info.queues.insert(
                String::from_utf8_lossy(&name).into_owned(),
                QueueInfo { num_messages },
            );
        }

        info
    }

    /// Returns the queue registered under `name`, creating an empty one
    /// on first reference. Fails unless the server is Active.
    pub(crate) fn get_queue(&self, name: &Bytes) -> Result<MessageQueue> {
        let mut shared = self.inner.shared.write();
        if shared.state != ServerState::Active {
            return Err(RelayqError::InsufficientServerState);
        }

        if let Some(queue) = shared.queues.get(name) {
            return Ok(queue.clone());
        }

        let queue = MessageQueue::new();
        shared.queues.insert(name.clone(), queue.clone());
        Ok(queue)
    }

    fn remove_connection(&self, id: u64) {
        self.inner.shared.write().connections.remove(&id);
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

/// Accept errors a listener can see transiently, typically a peer that
/// aborted mid-handshake or an interrupted syscall. Anything else is
/// fatal to the accept loop.
fn is_temporary(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display_names() {
        assert_eq!(ServerState::New.to_string(), "new");
        assert_eq!(ServerState::Active.to_string(), "active");
        assert_eq!(ServerState::Stopped.to_string(), "stopped");
    }

    #[test]
    fn temporary_accept_errors() {
        assert!(is_temporary(&io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(is_temporary(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_temporary(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }
}
