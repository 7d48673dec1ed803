//! The per-connection session: heartbeat state machine, sid, write buffer.
//!
//! One [`Socket`] owns exactly one transport for its whole life. The
//! `socketioxide` layer never talks to the transport directly; it only ever
//! calls [`Socket::emit`]/[`Socket::emit_binary`]/[`Socket::close`].

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::request::Parts;
use tokio::sync::{mpsc, watch};

use crate::errors::Error;
use crate::sid::Sid;

/// Reasons an Engine.IO [`Socket`] can be closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// The client gracefully closed the connection.
    TransportClose,
    /// The connection broke unexpectedly (network error, reset, etc).
    TransportError,
    /// Neither a pong nor a client ping arrived before `ping_timeout` elapsed.
    HeartbeatTimeout,
    /// A frame could not be parsed.
    PacketParsingError,
    /// The server is shutting down.
    ClosingServer,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use DisconnectReason::*;
        let s = match self {
            TransportClose => "client gracefully closed the connection",
            TransportError => "the connection was abruptly closed",
            HeartbeatTimeout => "client did not send a PONG packet in time",
            PacketParsingError => "client sent a bad request / the packet could not be parsed",
            ClosingServer => "server is being closed",
        };
        f.write_str(s)
    }
}

/// Lifecycle state of a [`Socket`], per spec: `OPENING -> OPEN -> CLOSING -> CLOSED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Opening,
    Open,
    Closing(DisconnectReason),
    Closed(DisconnectReason),
}

impl ReadyState {
    fn reason(&self) -> Option<DisconnectReason> {
        match self {
            ReadyState::Closing(r) | ReadyState::Closed(r) => Some(*r),
            _ => None,
        }
    }
}

/// An outgoing frame queued on a socket's write buffer.
#[derive(Debug, Clone)]
pub(crate) enum OutgoingFrame {
    Text(String),
    Binary(Vec<u8>),
}

impl OutgoingFrame {
    fn len(&self) -> usize {
        match self {
            OutgoingFrame::Text(s) => s.len(),
            OutgoingFrame::Binary(b) => b.len(),
        }
    }
}

/// A single Engine.IO session: sid, heartbeat state, ordered write buffer,
/// and (via `data`) whatever per-session state the upper layer needs.
pub struct Socket<D: Default + Send + Sync + 'static> {
    /// This session's id.
    pub id: Sid,
    /// Upper-layer (socketioxide) per-session user data.
    pub data: D,
    /// The HTTP request parts used to establish the upgrade, snapshotted at
    /// connect time so handlers can inspect headers/query after the fact.
    pub req_parts: Arc<Parts>,
    /// Address the request appeared to originate from.
    pub remote_addr: SocketAddr,

    pub(crate) tx: mpsc::Sender<OutgoingFrame>,
    state_tx: watch::Sender<ReadyState>,
    state_rx: watch::Receiver<ReadyState>,
    buffered_bytes: AtomicUsize,
    backpressure_limit: usize,
}

impl<D: Default + Send + Sync + 'static> fmt::Debug for Socket<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socket")
            .field("id", &self.id)
            .field("ready_state", &*self.state_rx.borrow())
            .finish()
    }
}

impl<D: Default + Send + Sync + 'static> Socket<D> {
    pub(crate) fn new(
        req_parts: Arc<Parts>,
        remote_addr: SocketAddr,
        tx: mpsc::Sender<OutgoingFrame>,
        backpressure_limit: usize,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ReadyState::Opening);
        Self {
            id: Sid::new(),
            data: D::default(),
            req_parts,
            remote_addr,
            tx,
            state_tx,
            state_rx,
            buffered_bytes: AtomicUsize::new(0),
            backpressure_limit,
        }
    }

    /// Builds a `Socket` with no backing transport, for unit tests that only
    /// need the `on`/`emit` surface and never drive a real connection.
    #[cfg(any(test, feature = "test-util"))]
    pub fn new_dummy(id: Sid, on_close: Box<dyn Fn(Sid, DisconnectReason) + Send + Sync>) -> Self {
        let (tx, mut rx) = mpsc::channel(128);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        let parts = http::Request::builder()
            .uri("/")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        let (state_tx, state_rx) = watch::channel(ReadyState::Open);
        let _ = on_close; // dummy sockets never actually close themselves
        Self {
            id,
            data: D::default(),
            req_parts: Arc::new(parts),
            remote_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            tx,
            state_tx,
            state_rx,
            buffered_bytes: AtomicUsize::new(0),
            backpressure_limit: usize::MAX,
        }
    }

    /// Current [`ReadyState`].
    pub fn ready_state(&self) -> ReadyState {
        *self.state_rx.borrow()
    }

    pub(crate) fn set_open(&self) {
        let _ = self.state_tx.send(ReadyState::Open);
    }

    /// Whether the session is no longer accepting writes.
    pub fn is_closed(&self) -> bool {
        matches!(self.ready_state(), ReadyState::Closing(_) | ReadyState::Closed(_))
    }

    /// Enqueues an application payload (an already-encoded Socket.IO packet)
    /// as a `MESSAGE` frame. Returns `Err` if the session is closing/closed
    /// or the write buffer channel is saturated.
    pub fn emit(&self, msg: String) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::InternalChannel);
        }
        self.buffered_bytes.fetch_add(msg.len(), Ordering::AcqRel);
        self.tx
            .try_send(OutgoingFrame::Text(msg))
            .map_err(|_| Error::InternalChannel)
    }

    /// Enqueues a raw binary attachment frame.
    pub fn emit_binary(&self, data: Vec<u8>) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::InternalChannel);
        }
        self.buffered_bytes.fetch_add(data.len(), Ordering::AcqRel);
        self.tx
            .try_send(OutgoingFrame::Binary(data))
            .map_err(|_| Error::InternalChannel)
    }

    /// Whether the underlying transport currently has room under the
    /// backpressure high-water mark. Used to implement `volatile` emits,
    /// which are dropped rather than queued when this returns `false`.
    pub fn is_writable(&self) -> bool {
        !self.is_closed() && self.buffered_bytes.load(Ordering::Acquire) < self.backpressure_limit
    }

    pub(crate) fn note_flushed(&self, frame: &OutgoingFrame) {
        let len = frame.len();
        self.buffered_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                Some(cur.saturating_sub(len))
            })
            .ok();
    }

    /// Requests that the session close with the given reason. Idempotent:
    /// only the first call takes effect. This only flips the state to
    /// `Closing`; the owning transport task performs the actual teardown and
    /// then calls [`Socket::mark_fully_closed`].
    pub fn close(&self, reason: DisconnectReason) {
        if self.is_closed() {
            return;
        }
        let _ = self.state_tx.send(ReadyState::Closing(reason));
    }

    /// The reason this socket was closed, once it has been.
    pub fn close_reason(&self) -> Option<DisconnectReason> {
        self.ready_state().reason()
    }

    /// Resolves once [`Socket::close`] has been called (the request to
    /// close, not necessarily full teardown).
    pub(crate) async fn close_requested(&self) -> DisconnectReason {
        let mut rx = self.state_rx.clone();
        loop {
            if let Some(reason) = rx.borrow().reason() {
                return reason;
            }
            if rx.changed().await.is_err() {
                return DisconnectReason::TransportError;
            }
        }
    }

    /// Resolves once the transport backing this socket has fully shut down.
    pub async fn closed(&self) {
        let mut rx = self.state_rx.clone();
        loop {
            if matches!(*rx.borrow(), ReadyState::Closed(_)) {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub(crate) fn mark_fully_closed(&self, reason: DisconnectReason) {
        let _ = self.state_tx.send(ReadyState::Closed(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_socket() -> Socket<()> {
        Socket::<()>::new_dummy(Sid::new(), Box::new(|_, _| {}))
    }

    #[tokio::test]
    async fn emit_fails_after_close() {
        let socket = dummy_socket();
        socket.close(DisconnectReason::TransportClose);
        assert!(socket.emit("4hi".into()).is_err());
    }

    #[tokio::test]
    async fn close_is_idempotent_on_reason() {
        let socket = dummy_socket();
        socket.close(DisconnectReason::TransportClose);
        socket.close(DisconnectReason::HeartbeatTimeout);
        assert_eq!(socket.close_reason(), Some(DisconnectReason::TransportClose));
    }

    #[tokio::test]
    async fn writable_until_backpressure_limit() {
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        let parts = http::Request::builder().uri("/").body(()).unwrap().into_parts().0;
        let socket = Socket::<()>::new(
            Arc::new(parts),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            tx,
            10,
        );
        assert!(socket.is_writable());
        socket.emit("x".repeat(20)).unwrap();
        assert!(!socket.is_writable());
    }

    #[tokio::test]
    async fn closed_resolves_after_mark_fully_closed() {
        let socket = dummy_socket();
        socket.close(DisconnectReason::TransportClose);
        socket.mark_fully_closed(DisconnectReason::TransportClose);
        socket.closed().await;
    }
}
