//! TCP server and connection handling.
//!
//! - [`Server`] owns the listener lifecycle, the queue registry and the
//!   set of live connections, and cascades `stop` into all of them.
//! - Each accepted connection runs its own request loop in a spawned
//!   task, reading frames, dispatching commands and writing responses.

mod connection;
mod server;

pub use server::{Server, ServerState};
