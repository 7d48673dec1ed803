//! The application-facing, per-attachment `Socket` (spec.md §3/§4.6): event
//! dispatch, the ack registry, room operations, and the broadcast-builder
//! entry points. Grounded directly on the retrieved
//! `step-finance-socketioxide/socketioxide/src/socket.rs`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use engineioxide::socket::DisconnectReason as EIoDisconnectReason;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot::{self, Receiver};

#[cfg(feature = "extensions")]
use crate::extensions::Extensions;

use crate::{
    ack::{AckInnerStream, AckResponse, AckResult, AckStream},
    adapter::{Adapter, LocalAdapter, Room, RoomParam},
    client::SocketData,
    errors::{AdapterError, DisconnectError, Error, SocketError},
    ns::Namespace,
    operators::Operators,
    packet::{BinaryPacket, Packet, PacketData},
    SocketIoConfig,
};

pub use engineioxide::sid::Sid;

/// All the possible reasons a [`Socket`] can be disconnected from a
/// namespace (spec.md §4.6's reason vocabulary).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DisconnectReason {
    /// The client gracefully closed the connection.
    TransportClose,
    /// A frame could not be parsed.
    PacketParsingError,
    /// The connection broke unexpectedly.
    TransportError,
    /// No pong arrived within `ping_timeout`.
    HeartbeatTimeout,
    /// The client sent a Socket.IO DISCONNECT for this namespace.
    ClientNSDisconnect,
    /// The server called [`Socket::disconnect`] with `close=false`: detached
    /// from the namespace, underlying transport left open.
    ServerNSDisconnect,
    /// The server called [`Socket::disconnect`] with `close=true`, or
    /// [`Operators::disconnect_sockets`](crate::operators::Operators::disconnect_sockets)
    /// with `close=true`: the namespace detach is followed by tearing down
    /// the whole engine.io session (spec.md §4.6's reason vocabulary).
    ForcedClose,
    /// The server is shutting down.
    ClosingServer,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use DisconnectReason::*;
        let s = match self {
            TransportClose => "client gracefully closed the connection",
            PacketParsingError => "client sent a bad request / the packet could not be parsed",
            TransportError => "the connection was abruptly closed",
            HeartbeatTimeout => "client did not send a PONG packet in time",
            ClientNSDisconnect => "client has manually disconnected the socket from the namespace",
            ServerNSDisconnect => "socket was forcefully disconnected from the namespace",
            ForcedClose => "forced close",
            ClosingServer => "server is being closed",
        };
        f.write_str(s)
    }
}

impl From<EIoDisconnectReason> for DisconnectReason {
    fn from(reason: EIoDisconnectReason) -> Self {
        use DisconnectReason::*;
        match reason {
            EIoDisconnectReason::TransportClose => TransportClose,
            EIoDisconnectReason::TransportError => TransportError,
            EIoDisconnectReason::HeartbeatTimeout => HeartbeatTimeout,
            EIoDisconnectReason::PacketParsingError => PacketParsingError,
            EIoDisconnectReason::ClosingServer => ClosingServer,
        }
    }
}

/// A snapshot of connection-time metadata, taken once when the socket is
/// created and never mutated afterwards (spec.md §3's Socket entity /
/// §6 "the Socket's handshake snapshot records these verbatim").
#[derive(Debug, Clone)]
pub struct Handshake {
    /// Request headers captured at upgrade time.
    pub headers: http::HeaderMap,
    /// Raw query string of the upgrade request (e.g. `EIO=4&transport=websocket`).
    pub query: String,
    /// The CONNECT packet's auth payload.
    pub auth: Value,
    /// When this socket was created.
    pub issued_at: std::time::SystemTime,
    /// Address the upgrade request appeared to originate from.
    pub address: std::net::SocketAddr,
}

/// A Socket represents a client connected to a namespace. Application code
/// normally sees this through [`crate::extract::SocketRef`] rather than
/// holding the `Arc` directly.
pub struct Socket<A: Adapter = LocalAdapter> {
    pub(crate) config: Arc<SocketIoConfig>,
    pub(crate) ns: Arc<Namespace<A>>,
    handshake: Handshake,
    message_handlers: RwLock<HashMap<Cow<'static, str>, crate::handler::BoxedMessageHandler<A>>>,
    /// Fired first in the DISCONNECT sequence, while room membership is still
    /// intact (spec.md §4.5), so it can observe the full `rooms()` view.
    disconnecting_handler: Mutex<Option<crate::handler::BoxedDisconnectHandler<A>>>,
    disconnect_handler: Mutex<Option<crate::handler::BoxedDisconnectHandler<A>>>,
    error_handler: Mutex<Option<Box<dyn Fn(&Socket<A>, &str) + Send + Sync>>>,
    /// Per-socket inbound middleware, run in registration order over the
    /// `[eventName, ...args]` tuple before listener dispatch (spec.md §4.6
    /// step 1 / §8 scenario 6). Each inbound packet uses the chain as it
    /// stood when dispatch began (spec.md §9's pinned Open Question).
    middleware: RwLock<Vec<Box<dyn Fn(&mut Vec<Value>) -> Result<(), String> + Send + Sync>>>,
    ack_message: Mutex<HashMap<i64, oneshot::Sender<AckResult>>>,
    ack_counter: AtomicI64,
    /// The socket id. Per spec.md §3, `id ∈ rooms(id)` for the whole
    /// lifetime of the socket (joined automatically on attach).
    pub id: Sid,

    /// A type map of protocol extensions, gated behind the `extensions`
    /// feature flag, matching the teacher's optional ambient plumbing.
    #[cfg(feature = "extensions")]
    pub extensions: Extensions,
    esocket: Arc<engineioxide::Socket<SocketData>>,
}

impl<A: Adapter> Socket<A> {
    pub(crate) fn new(
        sid: Sid,
        ns: Arc<Namespace<A>>,
        esocket: Arc<engineioxide::Socket<SocketData>>,
        config: Arc<SocketIoConfig>,
        auth: Value,
    ) -> Self {
        let handshake = Handshake {
            headers: esocket.req_parts.headers.clone(),
            query: esocket.req_parts.uri.query().unwrap_or_default().to_string(),
            auth,
            issued_at: std::time::SystemTime::now(),
            address: esocket.remote_addr,
        };
        Self {
            ns,
            handshake,
            message_handlers: RwLock::new(HashMap::new()),
            disconnecting_handler: Mutex::new(None),
            disconnect_handler: Mutex::new(None),
            error_handler: Mutex::new(None),
            middleware: RwLock::new(Vec::new()),
            ack_message: Mutex::new(HashMap::new()),
            ack_counter: AtomicI64::new(0),
            id: sid,
            #[cfg(feature = "extensions")]
            extensions: Extensions::new(),
            config,
            esocket,
        }
    }

    /// Registers a handler for `event`. See [`crate::extract`] for the
    /// available extractors; a handler may take any 0-4 tuple of them.
    pub fn on<H, T>(&self, event: impl Into<Cow<'static, str>>, handler: H)
    where
        H: crate::handler::MessageHandler<A, T>,
        T: Send + Sync + 'static,
    {
        self.message_handlers
            .write()
            .unwrap()
            .insert(event.into(), crate::handler::MakeErasedHandler::new_message_boxed(handler));
    }

    /// Registers the (single) `disconnecting` handler for this socket: runs
    /// before room memberships are dropped, so `self.rooms()` still reports
    /// every room the socket was in (spec.md §4.5). Only the most recently
    /// registered one is kept.
    pub fn on_disconnecting<C, T>(&self, callback: C)
    where
        C: crate::handler::DisconnectHandler<A, T> + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        let handler = crate::handler::MakeErasedHandler::new_disconnect_boxed(callback);
        self.disconnecting_handler.lock().unwrap().replace(handler);
    }

    /// Registers the (single) `disconnect` handler for this socket: runs
    /// after room memberships have been dropped, so `self.rooms()` is empty
    /// by the time it fires (spec.md §4.5). Only the most recently
    /// registered one is kept.
    pub fn on_disconnect<C, T>(&self, callback: C)
    where
        C: crate::handler::DisconnectHandler<A, T> + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        let handler = crate::handler::MakeErasedHandler::new_disconnect_boxed(callback);
        self.disconnect_handler.lock().unwrap().replace(handler);
    }

    /// Registers the (single) `error` listener, raised when a per-socket
    /// middleware rejects an inbound packet (spec.md §4.6 step 1, §7
    /// "MiddlewareError"). Does not close the socket.
    pub fn on_error(&self, listener: impl Fn(&Socket<A>, &str) + Send + Sync + 'static) {
        self.error_handler.lock().unwrap().replace(Box::new(listener));
    }

    /// Appends a per-socket inbound middleware, run in registration order
    /// over the `[eventName, ...args]` tuple of every subsequent inbound
    /// EVENT before its listener runs (spec.md §4.6 step 1). A middleware
    /// may mutate the tuple in place (prepend, replace) or reject dispatch
    /// by returning `Err(message)`, which raises `error` instead of
    /// invoking any listener.
    pub fn add_middleware(&self, middleware: impl Fn(&mut Vec<Value>) -> Result<(), String> + Send + Sync + 'static) {
        self.middleware.write().unwrap().push(Box::new(middleware));
    }

    /// Emits `event` with `data` to this socket.
    pub fn emit(&self, event: impl Into<Cow<'static, str>>, data: impl Serialize) -> Result<(), SocketError> {
        let event = event.into();
        let ns = self.ns().to_string();
        let data = serde_json::to_value(data).map_err(|_| SocketError::InternalChannelFull)?;
        self.ns.fire_any_outgoing(self, &event, &data);
        self.send(Packet::event(ns, event, data))
    }

    /// Emits `event` with `data` and waits for the client's acknowledgement,
    /// bounded by the configured (or per-call `timeout()`-overridden) ack
    /// timeout (spec.md §4.6 "ACK resolution"/§8 "Timeout liveness").
    pub fn emit_with_ack<V>(&self, event: impl Into<Cow<'static, str>>, data: impl Serialize) -> AckStream<V> {
        let ns = self.ns().to_string();
        match serde_json::to_value(data) {
            Ok(data) => {
                let packet = Packet::event(ns, event.into(), data);
                let rx = self.send_with_ack(packet);
                AckInnerStream::send(rx, self.config.ack_timeout).into()
            }
            Err(e) => AckStream::<V>::from(e),
        }
    }

    // Room actions

    pub fn join(&self, rooms: impl RoomParam) -> Result<(), A::Error> {
        self.ns.adapter.add_all(self.id, rooms)
    }

    pub fn leave(&self, rooms: impl RoomParam) -> Result<(), A::Error> {
        self.ns.adapter.del(self.id, rooms)
    }

    pub fn leave_all(&self) -> Result<(), A::Error> {
        self.ns.adapter.del_all(self.id)
    }

    pub fn rooms(&self) -> Result<Vec<Room>, A::Error> {
        self.ns.adapter.socket_rooms(self.id)
    }

    // Broadcast-builder entry points. Each seeds an `Operators` with this
    // socket's own room already in `exclude`, matching spec.md §4.6's
    // "`to`/`in` ... each return a BroadcastOperator ... with the
    // sender-exclusion room already present".

    pub fn to(&self, rooms: impl RoomParam) -> Operators<A> {
        Operators::new(self.ns.clone(), Some(self.id)).to(rooms)
    }

    pub fn within(&self, rooms: impl RoomParam) -> Operators<A> {
        Operators::new(self.ns.clone(), Some(self.id)).within(rooms)
    }

    pub fn except(&self, rooms: impl RoomParam) -> Operators<A> {
        Operators::new(self.ns.clone(), Some(self.id)).except(rooms)
    }

    pub fn local(&self) -> Operators<A> {
        Operators::new(self.ns.clone(), Some(self.id)).local()
    }

    pub fn timeout(&self, timeout: Duration) -> Operators<A> {
        Operators::new(self.ns.clone(), Some(self.id)).timeout(timeout)
    }

    pub fn bin(&self, binary: bool) -> Operators<A> {
        Operators::new(self.ns.clone(), Some(self.id)).bin(binary)
    }

    /// Shorthand for a builder that excludes only this socket (spec.md
    /// §4.6's "`broadcast` is shorthand for ... excludes self").
    pub fn broadcast(&self) -> Operators<A> {
        Operators::new(self.ns.clone(), Some(self.id)).broadcast()
    }

    /// Disconnects from the current namespace and runs the disconnect
    /// handler, if any. With `close=false` only the namespace attachment is
    /// torn down, leaving the underlying engine.io session open for other
    /// namespaces; with `close=true` the whole session is closed afterwards
    /// (spec.md §4.6's "Special server-initiated disconnect").
    pub async fn disconnect(self: Arc<Self>, close: bool) -> Result<(), DisconnectError> {
        if self.send(Packet::disconnect(self.ns().to_string())) == Err(SocketError::InternalChannelFull) {
            return Err(DisconnectError::InternalChannelFull);
        }
        let reason = if close { DisconnectReason::ForcedClose } else { DisconnectReason::ServerNSDisconnect };
        self.clone().close(reason)?;
        if close {
            self.close_underlying_transport().await;
        }
        Ok(())
    }

    /// Closes the underlying engine.io connection if it is not already
    /// closed, and waits for the transport to fully tear down.
    pub(crate) async fn close_underlying_transport(&self) {
        if !self.esocket.is_closed() {
            #[cfg(feature = "tracing")]
            tracing::debug!("closing underlying transport for socket: {}", self.id);
            self.esocket.close(EIoDisconnectReason::ClosingServer);
        }
        self.esocket.closed().await;
    }

    pub fn ns(&self) -> &str {
        &self.ns.path
    }

    /// Whether this socket's underlying transport currently has room under
    /// its backpressure high-water mark (spec.md §4.6/§4.7's `volatile`
    /// emit: dropped rather than queued when this returns `false`).
    pub fn is_writable(&self) -> bool {
        self.esocket.is_writable()
    }

    /// The connection-time snapshot recorded when this socket attached
    /// (spec.md §3/§6). Immutable for the socket's whole lifetime.
    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    pub(crate) fn send(&self, mut packet: Packet<'_>) -> Result<(), SocketError> {
        let bin_payloads = match packet.inner {
            PacketData::BinaryEvent(_, ref mut bin, _) | PacketData::BinaryAck(ref mut bin, _) => {
                Some(std::mem::take(&mut bin.bin))
            }
            _ => None,
        };
        let msg: String = packet.try_into().map_err(|_| SocketError::InternalChannelFull)?;
        self.esocket.emit(msg)?;
        if let Some(bin_payloads) = bin_payloads {
            for bin in bin_payloads {
                self.esocket.emit_binary(bin)?;
            }
        }
        Ok(())
    }

    /// Sends a raw pre-encoded binary frame directly, bypassing the packet
    /// codec entirely. Used for the compact hot-event framing (spec.md
    /// §4.1/§6/§9), which is a standalone Engine.IO binary frame rather than
    /// an attachment tied to a `BinaryEvent`/`BinaryAck` packet.
    pub(crate) fn send_binary_frame(&self, frame: Vec<u8>) -> Result<(), SocketError> {
        self.esocket.emit_binary(frame).map_err(SocketError::from)
    }

    pub(crate) fn send_with_ack(&self, mut packet: Packet<'_>) -> Receiver<AckResult> {
        let (tx, rx) = oneshot::channel();
        let ack = self.ack_counter.fetch_add(1, Ordering::SeqCst) + 1;
        packet.inner.set_ack_id(ack);
        match self.send(packet) {
            Ok(()) => {
                self.ack_message.lock().unwrap().insert(ack, tx);
            }
            Err(e) => {
                let _ = tx.send(Err(e));
            }
        }
        rx
    }

    /// Called when the socket is disconnected, from any cause. Runs the full
    /// DISCONNECT sequence in order (spec.md §4.5): `disconnecting` fires
    /// with room membership still intact, then rooms are dropped, then
    /// `disconnect` fires seeing an empty `rooms()`, then the socket is
    /// removed from the namespace's socket table.
    pub(crate) fn close(self: Arc<Self>, reason: DisconnectReason) -> Result<(), AdapterError> {
        if let Some(handler) = self.disconnecting_handler.lock().unwrap().take() {
            handler.call(self.clone(), reason);
        }
        self.ns.del_all_rooms(self.id)?;
        if let Some(handler) = self.disconnect_handler.lock().unwrap().take() {
            handler.call(self.clone(), reason);
        }
        self.ns.remove_socket(self.id);
        Ok(())
    }

    /// Handles one decoded packet body addressed to this socket (spec.md
    /// §4.6's inbound EVENT dispatch, plus DISCONNECT/ACK handling).
    pub(crate) fn recv(self: Arc<Self>, packet: PacketData<'_>) -> Result<(), Error> {
        match packet {
            PacketData::Event(e, data, ack) => self.recv_event(&e, data, vec![], ack),
            PacketData::EventAck(data, ack_id) => self.recv_ack(data, vec![], ack_id),
            PacketData::BinaryEvent(e, bin, ack) => self.recv_event(&e, bin.data, bin.bin, ack),
            PacketData::BinaryAck(bin, ack_id) => self.recv_ack(bin.data, bin.bin, ack_id),
            PacketData::Disconnect => self.close(DisconnectReason::ClientNSDisconnect).map_err(Error::from),
            _ => Ok(()),
        }
    }

    fn recv_event(self: Arc<Self>, e: &str, data: Value, bin: Vec<Vec<u8>>, ack: Option<i64>) -> Result<(), Error> {
        let mut tuple = vec![Value::String(e.to_string())];
        match data {
            Value::Array(args) => tuple.extend(args),
            Value::Null => {}
            other => tuple.push(other),
        }

        for middleware in self.middleware.read().unwrap().iter() {
            if let Err(message) = middleware(&mut tuple) {
                if let Some(handler) = self.error_handler.lock().unwrap().as_ref() {
                    handler(self.as_ref(), &message);
                }
                return Ok(());
            }
        }

        if tuple.is_empty() {
            return Ok(());
        }
        let Value::String(event) = tuple.remove(0) else {
            return Ok(());
        };
        let data = match tuple.len() {
            0 => Value::Null,
            1 => tuple.remove(0),
            _ => Value::Array(tuple),
        };

        self.ns.fire_any(self.as_ref(), &event, &data);
        if let Some(handler) = self.message_handlers.read().unwrap().get(event.as_str()) {
            handler.call(self.clone(), data, bin, ack);
        }
        Ok(())
    }

    fn recv_ack(self: Arc<Self>, data: Value, binary: Vec<Vec<u8>>, ack: i64) -> Result<(), Error> {
        if let Some(tx) = self.ack_message.lock().unwrap().remove(&ack) {
            let _ = tx.send(Ok(AckResponse { data, binary }));
        }
        Ok(())
    }
}

impl<A: Adapter> Debug for Socket<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("ns", &self.ns())
            .field("sid", &self.id)
            .finish()
    }
}

#[cfg(test)]
impl<A: Adapter> Socket<A> {
    pub fn new_dummy(sid: Sid, ns: Arc<Namespace<A>>) -> Arc<Socket<A>> {
        let close_fn: Box<dyn Fn(Sid, EIoDisconnectReason) + Send + Sync> = Box::new(move |_, _| ());
        Arc::new(Socket::new(
            sid,
            ns,
            Arc::new(engineioxide::Socket::new_dummy(sid, close_fn)),
            Arc::new(SocketIoConfig::default()),
            Value::Null,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::errors::AckError;

    #[tokio::test]
    async fn send_with_ack_error() {
        let sid = Sid::new();
        let ns = Arc::new(Namespace::<LocalAdapter>::new_dummy([sid]));
        let socket = Socket::new_dummy(sid, ns);
        for _ in 0..200 {
            socket.send(Packet::event("/", "test", Value::Null)).unwrap();
        }
        let ack = socket.emit_with_ack::<Value>("test", Value::Null).await;
        assert!(matches!(ack, Err(AckError::Socket(SocketError::InternalChannelFull))));
    }

    #[tokio::test]
    async fn join_adds_self_to_room() {
        let sid = Sid::new();
        let ns = Arc::new(Namespace::<LocalAdapter>::new_dummy([]));
        let socket = Socket::new_dummy(sid, ns.clone());
        socket.join("room1".to_string()).unwrap();
        assert!(socket.rooms().unwrap().contains(&"room1".to_string()));
    }

    /// spec.md §8 scenario 6: two middlewares run in order, the first
    /// prepending `"wrapped"` to the event tuple, the second asserting the
    /// resulting tuple, and the listener registered on `"wrapped"` sees the
    /// original two arguments.
    #[tokio::test]
    async fn middleware_chain_mutates_event_tuple_before_dispatch() {
        let sid = Sid::new();
        let ns = Arc::new(Namespace::<LocalAdapter>::new_dummy([]));
        let socket = Socket::new_dummy(sid, ns);

        socket.add_middleware(|tuple| {
            tuple.insert(0, Value::String("wrapped".into()));
            Ok(())
        });
        socket.add_middleware(|tuple| {
            let expected = vec![
                Value::String("wrapped".into()),
                Value::String("join".into()),
                Value::String("room1".into()),
            ];
            assert_eq!(tuple, &expected);
            Ok(())
        });

        let seen: Arc<Mutex<Option<(String, String)>>> = Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        socket.on("wrapped", move |_socket: Arc<Socket<LocalAdapter>>, crate::extract::Data(args): crate::extract::Data<(String, String)>| {
            seen2.lock().unwrap().replace(args);
        });

        socket
            .clone()
            .recv(PacketData::Event(
                Cow::Borrowed("join"),
                Value::String("room1".into()),
                None,
            ))
            .unwrap();

        assert_eq!(seen.lock().unwrap().as_ref(), Some(&("join".to_string(), "room1".to_string())));
    }

    #[tokio::test]
    async fn rejecting_middleware_raises_error_without_dispatching() {
        let sid = Sid::new();
        let ns = Arc::new(Namespace::<LocalAdapter>::new_dummy([]));
        let socket = Socket::new_dummy(sid, ns);

        socket.add_middleware(|_tuple| Err("nope".to_string()));
        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let fired2 = fired.clone();
        let seen_error = Arc::new(Mutex::new(None));
        let seen_error2 = seen_error.clone();
        socket.on_error(move |_socket, message| {
            seen_error2.lock().unwrap().replace(message.to_string());
        });
        socket.on("test", move |_socket: Arc<Socket<LocalAdapter>>| {
            fired2.store(true, Ordering::SeqCst);
        });

        socket
            .clone()
            .recv(PacketData::Event(Cow::Borrowed("test"), Value::Null, None))
            .unwrap();

        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(seen_error.lock().unwrap().as_deref(), Some("nope"));
    }

    /// spec.md §4.5's DISCONNECT ordering: `disconnecting` sees the full room
    /// set, rooms are then dropped, and `disconnect` sees an empty set.
    #[tokio::test]
    async fn disconnecting_sees_full_rooms_disconnect_sees_empty_rooms() {
        let sid = Sid::new();
        let ns = Arc::new(Namespace::<LocalAdapter>::new_dummy([]));
        let socket = Socket::new_dummy(sid, ns);
        socket.join("room1".to_string()).unwrap();

        let disconnecting_rooms: Arc<Mutex<Option<Vec<String>>>> = Arc::new(Mutex::new(None));
        let disconnecting_rooms2 = disconnecting_rooms.clone();
        socket.on_disconnecting(move |socket: Arc<Socket<LocalAdapter>>, _reason| {
            disconnecting_rooms2.lock().unwrap().replace(socket.rooms().unwrap());
        });

        let disconnect_rooms: Arc<Mutex<Option<Vec<String>>>> = Arc::new(Mutex::new(None));
        let disconnect_rooms2 = disconnect_rooms.clone();
        socket.on_disconnect(move |socket: Arc<Socket<LocalAdapter>>, _reason| {
            disconnect_rooms2.lock().unwrap().replace(socket.rooms().unwrap());
        });

        socket.close(DisconnectReason::ClientNSDisconnect).unwrap();
        // Handlers run as spawned tasks; give the runtime a turn to drive them.
        tokio::task::yield_now().await;

        assert!(disconnecting_rooms.lock().unwrap().as_ref().unwrap().contains(&"room1".to_string()));
        assert!(disconnect_rooms.lock().unwrap().as_ref().unwrap().is_empty());
    }
}
