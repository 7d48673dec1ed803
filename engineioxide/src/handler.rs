//! The callback surface the [`socketioxide`](https://docs.rs/socketioxide)-equivalent
//! layer implements to be notified of transport-level events.

use std::sync::Arc;

use crate::socket::{DisconnectReason, Socket};

/// Re-exported so downstream crates implementing [`EngineIoHandler`] don't need
/// to depend on `async-trait` directly for the parts of the trait that need it.
pub use async_trait::async_trait;

/// Callbacks invoked by the transport/session layer as sockets come and go
/// and as frames arrive.
///
/// Implementations must be cheap to clone (an `Arc`-wrapped handle is typical)
/// since a clone is handed to every accepted connection's task.
pub trait EngineIoHandler: Send + Sync + 'static {
    /// Per-session user data, stored alongside the session and accessible
    /// from every callback via `socket.data`.
    type Data: Default + Send + Sync + 'static;

    /// Called once the session reaches `OPEN` and has been handed its [`Socket`].
    fn on_connect(&self, socket: Arc<Socket<Self::Data>>);

    /// Called once, when the session closes for any reason.
    fn on_disconnect(&self, socket: Arc<Socket<Self::Data>>, reason: DisconnectReason);

    /// Called for every decoded text `MESSAGE` frame.
    fn on_message(&self, msg: String, socket: Arc<Socket<Self::Data>>);

    /// Called for every binary frame (used by `socketioxide` to reassemble
    /// multipart binary events, and by the hot-event binary registry).
    fn on_binary(&self, data: Vec<u8>, socket: Arc<Socket<Self::Data>>);
}
