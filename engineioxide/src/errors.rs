//! Error types for the transport/session boundary.

use thiserror::Error;

/// Errors that can occur while driving an Engine.IO [`Socket`](crate::socket::Socket).
#[derive(Debug, Error)]
pub enum Error {
    /// The frame could not be parsed as a valid Engine.IO packet.
    #[error("invalid engine.io packet: {0}")]
    Parse(#[from] crate::packet::ParsePacketError),

    /// A payload exceeded the configured `max_payload`.
    #[error("payload of {len} bytes exceeds max_payload of {max}")]
    PayloadTooLarge { len: usize, max: u64 },

    /// The session's write buffer channel is full or the receiving task has
    /// gone away.
    #[error("internal write channel closed or full")]
    InternalChannel,

    /// The underlying WebSocket connection failed.
    #[error("transport error: {0}")]
    Transport(String),
}
