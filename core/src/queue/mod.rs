//! In-memory FIFO queues.
//!
//! Each queue is owned by a single actor task that reacts to commands
//! from any number of producer and consumer tasks. The actor owns the
//! payload list outright; every operation is serialized through its
//! command channel.

use std::collections::VecDeque;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{RelayqError, Result};

#[cfg(test)]
mod tests;

enum Command {
    Enqueue(Bytes, oneshot::Sender<()>),
    Requeue(Bytes, oneshot::Sender<()>),
    Dequeue(oneshot::Sender<Bytes>),
    Len(oneshot::Sender<usize>),
}

/// Handle to one named queue. Cloneable; every clone talks to the same
/// actor task.
///
/// A consumer obtains a *ticket* with [`dequeue`](Self::dequeue) and
/// waits on it. The actor fulfils tickets in registration order, one
/// payload per ticket, and removes a payload from the head only when a
/// ticket accepts it. A consumer that gives up must `close()` its ticket
/// and drain a payload that may have been handed over concurrently with
/// `try_recv()` - either delivering it or putting it back with
/// [`requeue`](Self::requeue).
#[derive(Debug, Clone)]
pub struct MessageQueue {
    commands: mpsc::Sender<Command>,
    stop: CancellationToken,
}

impl MessageQueue {
    /// Creates an empty queue and spawns its actor task.
    pub fn new() -> Self {
        let (commands, receiver) = mpsc::channel(1);
        let stop = CancellationToken::new();

        let actor = QueueActor {
            commands: receiver,
            stop: stop.clone(),
            payloads: VecDeque::new(),
            waiters: VecDeque::new(),
        };
        tokio::spawn(actor.run());

        Self { commands, stop }
    }

    /// Appends a payload at the tail. Resolves only once the actor has
    /// taken the payload, so a completed `enqueue` happens before the
    /// payload is observable in the queue.
    pub async fn enqueue(&self, payload: Bytes) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(Command::Enqueue(payload, ack))
            .await
            .map_err(|_| RelayqError::QueueStopped)?;
        done.await.map_err(|_| RelayqError::QueueStopped)
    }

    /// Prepends a payload at the head, making it the next candidate for
    /// delivery. Same completion contract as [`enqueue`](Self::enqueue).
    pub async fn requeue(&self, payload: Bytes) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(Command::Requeue(payload, ack))
            .await
            .map_err(|_| RelayqError::QueueStopped)?;
        done.await.map_err(|_| RelayqError::QueueStopped)
    }

    /// Registers a consumer ticket and returns it. The ticket resolves
    /// with the next payload the actor hands to this consumer; it fails
    /// if the queue is stopped first.
    pub async fn dequeue(&self) -> Result<oneshot::Receiver<Bytes>> {
        let (ticket, receiver) = oneshot::channel();
        self.commands
            .send(Command::Dequeue(ticket))
            .await
            .map_err(|_| RelayqError::QueueStopped)?;
        Ok(receiver)
    }

    /// Number of payloads currently queued, serialized through the actor
    /// like every other operation.
    pub async fn len(&self) -> Result<usize> {
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(Command::Len(reply))
            .await
            .map_err(|_| RelayqError::QueueStopped)?;
        answer.await.map_err(|_| RelayqError::QueueStopped)
    }

    /// Stops the actor. Pending payloads are dropped and every blocked
    /// caller observes [`RelayqError::QueueStopped`]. Idempotent and
    /// non-blocking.
    pub fn stop(&self) {
        self.stop.cancel();
    }
}

struct QueueActor {
    commands: mpsc::Receiver<Command>,
    stop: CancellationToken,
    payloads: VecDeque<Bytes>,
    waiters: VecDeque<oneshot::Sender<Bytes>>,
}

impl QueueActor {
    async fn run(mut self) {
        loop {
            // Tickets abandoned by timed-out or cancelled consumers.
            self.waiters.retain(|ticket| !ticket.is_closed());
            self.deliver();

            tokio::select! {
                _ = self.stop.cancelled() => {
                    debug!(pending = self.payloads.len(), "queue actor stopped");
                    return;
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => return,
                },
            }
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Enqueue(payload, ack) => {
                self.payloads.push_back(payload);
                let _ = ack.send(());
            }
            Command::Requeue(payload, ack) => {
                self.payloads.push_front(payload);
                let _ = ack.send(());
            }
            Command::Dequeue(ticket) => self.waiters.push_back(ticket),
            Command::Len(reply) => {
                let _ = reply.send(self.payloads.len());
            }
        }
    }

    /// Hands queued payloads to waiting consumers, head first. A refused
    /// hand-off returns the payload, so the head leaves the queue only
    /// together with a successful delivery.
    fn deliver(&mut self) {
        'payloads: while let Some(mut payload) = self.payloads.pop_front() {
            while let Some(ticket) = self.waiters.pop_front() {
                match ticket.send(payload) {
                    Ok(()) => continue 'payloads,
                    Err(returned) => payload = returned,
                }
            }
            // No live waiter; the payload stays at the head.
            self.payloads.push_front(payload);
            return;
        }
    }
}
