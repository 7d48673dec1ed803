//! Error taxonomy for the namespace/room/socket layer, matching the error
//! boundaries spec.md §7 names: adapter failures, send failures, per-socket
//! recv failures, ack failures, and disconnect failures each get their own
//! type rather than being folded into one catch-all.

use thiserror::Error;

/// An error coming back from an [`Adapter`](crate::adapter::Adapter)
/// implementation. The in-memory [`LocalAdapter`](crate::adapter::LocalAdapter)
/// never produces one; this only exists so a distributed adapter has
/// somewhere to report network failures without changing the trait surface.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("internal channel closed")]
    InternalChannel,
}

/// Errors that can occur when sending a packet to a socket.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("internal channel full")]
    InternalChannelFull,
}

impl From<SocketError> for SendError {
    fn from(e: SocketError) -> Self {
        match e {
            SocketError::InternalChannelFull => SendError::InternalChannelFull,
            SocketError::Closed => SendError::InternalChannelFull,
        }
    }
}

/// Errors surfaced from the per-socket outbound path (the engineioxide write
/// buffer underneath a socket).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SocketError {
    #[error("internal channel full")]
    InternalChannelFull,
    #[error("socket closed")]
    Closed,
}

impl From<engineioxide::Error> for SocketError {
    fn from(_: engineioxide::Error) -> Self {
        SocketError::InternalChannelFull
    }
}

/// Errors that can occur while awaiting an ack.
#[derive(Debug, Error)]
pub enum AckError<T = serde_json::Value> {
    #[error("ack timed out")]
    Timeout,
    #[error("socket was closed before the ack was received")]
    SocketClosed,
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("ack payload deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("ack send error: {0}")]
    Send(#[from] SendError),
    #[doc(hidden)]
    #[error("unreachable")]
    _Phantom(std::marker::PhantomData<T>),
}

/// Errors from [`Socket::disconnect`](crate::socket::Socket::disconnect).
#[derive(Debug, Error)]
pub enum DisconnectError {
    #[error("internal channel full")]
    InternalChannelFull,
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// Top-level error type returned from packet dispatch (namespace CONNECT
/// handling, inbound event routing).
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid packet payload: {0}")]
    InvalidPacket(#[from] serde_json::Error),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),
    #[error(transparent)]
    Socket(#[from] SocketError),
}

impl Error {
    /// The engine.io-level disconnect reason a transport-closing variant of
    /// this error should cause, if any. Most `Error`s here are per-operation
    /// and do not close the underlying session (spec.md §7's propagation
    /// policy: only transport-integrity errors cascade into a close).
    pub fn as_disconnect_reason(&self) -> Option<engineioxide::DisconnectReason> {
        match self {
            Error::InvalidPacket(_) => Some(engineioxide::DisconnectReason::PacketParsingError),
            _ => None,
        }
    }
}
