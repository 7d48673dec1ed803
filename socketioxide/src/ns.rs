//! A namespace: the set of sockets attached under one path, its adapter, its
//! connection middleware chain, and the namespace-wide `onAny`/`onAnyOutgoing`
//! listener registries (spec.md §4.5).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use engineioxide::Sid;
use serde_json::Value;

use crate::adapter::Adapter;
use crate::errors::{AdapterError, Error};
use crate::handler::{BoxedConnectHandler, ConnectHandler, MakeErasedHandler};
use crate::packet::PacketData;
use crate::socket::{DisconnectReason, Socket};
use crate::SocketIoConfig;

type AnyListener<A> = Box<dyn Fn(&Socket<A>, &str, &Value) + Send + Sync>;

/// A connection-middleware entry: `(socket, auth) -> Result<(), message>`.
/// Failing a middleware short-circuits the CONNECT with an ERROR packet and
/// no socket is attached (spec.md §4.5 step 3).
pub type ConnectMiddleware<A> = Box<dyn Fn(&Arc<Socket<A>>, &Value) -> Result<(), String> + Send + Sync>;

/// One Socket.IO namespace. Created on demand, never garbage-collected
/// (spec.md §3's Namespace entity).
pub struct Namespace<A: Adapter> {
    pub path: String,
    pub(crate) adapter: A,
    pub(crate) config: Arc<SocketIoConfig>,
    sockets: RwLock<HashMap<Sid, Arc<Socket<A>>>>,
    connect_handler: RwLock<Option<BoxedConnectHandler<A>>>,
    middleware: RwLock<Vec<ConnectMiddleware<A>>>,
    on_any: RwLock<Vec<AnyListener<A>>>,
    on_any_outgoing: RwLock<Vec<AnyListener<A>>>,
}

impl<A: Adapter> Namespace<A> {
    /// Creates an empty namespace with no connect handler registered yet.
    /// `path` should begin with `/`; the default namespace is `/`.
    pub(crate) fn new(path: String, config: Arc<SocketIoConfig>) -> Arc<Self> {
        Arc::new(Self {
            path,
            adapter: A::new(),
            config,
            sockets: RwLock::new(HashMap::new()),
            connect_handler: RwLock::new(None),
            middleware: RwLock::new(Vec::new()),
            on_any: RwLock::new(Vec::new()),
            on_any_outgoing: RwLock::new(Vec::new()),
        })
    }

    /// Registers (replacing any previous one) the namespace's `connection`
    /// handler, invoked after CONNECT middleware succeeds (spec.md §4.5 step
    /// 4). See [`crate::handler::ConnectHandler`] for the extractor-tuple
    /// closures this accepts.
    pub fn on_connect<H, T>(&self, handler: H)
    where
        H: ConnectHandler<A, T>,
        T: Send + Sync + 'static,
    {
        let handler = MakeErasedHandler::new_connect_boxed(handler);
        self.connect_handler.write().unwrap().replace(handler);
    }

    /// Registers a connection-middleware entry (spec.md §4.5 step 3),
    /// appended to the chain in registration order.
    pub fn add_middleware(&self, middleware: ConnectMiddleware<A>) {
        self.middleware.write().unwrap().push(middleware);
    }

    /// Registers a listener invoked for every inbound event on every socket
    /// of this namespace, before the event's own listener (spec.md §4.6).
    pub fn on_any(&self, listener: impl Fn(&Socket<A>, &str, &Value) + Send + Sync + 'static) {
        self.on_any.write().unwrap().push(Box::new(listener));
    }

    /// Registers a listener invoked for every outbound event sent to any
    /// socket of this namespace, before it is enqueued (spec.md §4.6).
    pub fn on_any_outgoing(&self, listener: impl Fn(&Socket<A>, &str, &Value) + Send + Sync + 'static) {
        self.on_any_outgoing.write().unwrap().push(Box::new(listener));
    }

    pub(crate) fn fire_any(&self, socket: &Socket<A>, event: &str, data: &Value) {
        for listener in self.on_any.read().unwrap().iter() {
            listener(socket, event, data);
        }
    }

    pub(crate) fn fire_any_outgoing(&self, socket: &Socket<A>, event: &str, data: &Value) {
        for listener in self.on_any_outgoing.read().unwrap().iter() {
            listener(socket, event, data);
        }
    }

    /// Runs CONNECT: builds the socket, runs middleware, and on success
    /// attaches it, sends the CONNECT reply carrying the new socket id, and
    /// raises the namespace `connection` event (spec.md §4.5).
    pub(crate) fn connect(
        self: &Arc<Self>,
        sid: Sid,
        esocket: Arc<engineioxide::Socket<crate::client::SocketData>>,
        auth: Value,
    ) -> Result<(), Error> {
        let socket = Arc::new(Socket::new(sid, self.clone(), esocket, self.config.clone(), auth.clone()));

        for middleware in self.middleware.read().unwrap().iter() {
            if let Err(message) = middleware(&socket, &auth) {
                let packet = crate::packet::Packet::connect_error(self.path.clone(), message);
                let _ = socket.send(packet);
                return Ok(());
            }
        }

        socket.join(sid.to_string()).map_err(|_| AdapterError::InternalChannel)?;
        self.sockets.write().unwrap().insert(sid, socket.clone());

        let reply = crate::packet::Packet::connect(self.path.clone(), sid);
        let _ = socket.send(reply);

        if let Some(handler) = self.connect_handler.read().unwrap().as_ref() {
            handler.call(socket, auth);
        }
        Ok(())
    }

    /// Dispatches a decoded packet body to the socket it belongs to.
    pub(crate) fn recv(self: &Arc<Self>, sid: Sid, packet: PacketData<'_>) -> Result<(), Error> {
        if let Some(socket) = self.get_socket(sid) {
            socket.recv(packet)
        } else {
            Ok(())
        }
    }

    pub fn get_socket(&self, sid: Sid) -> Option<Arc<Socket<A>>> {
        self.sockets.read().unwrap().get(&sid).cloned()
    }

    pub fn sockets(&self) -> Vec<Arc<Socket<A>>> {
        self.sockets.read().unwrap().values().cloned().collect()
    }

    /// Drops every room membership `sid` holds (spec.md §4.5's `delAll`
    /// step). Called by [`Socket::close`](crate::socket::Socket::close) after
    /// its `disconnecting` hook has observed the full room set and before its
    /// `disconnect` handler runs, so that handler sees an empty `rooms()`.
    pub(crate) fn del_all_rooms(&self, sid: Sid) -> Result<(), AdapterError> {
        self.adapter.del_all(sid).map_err(|_| AdapterError::InternalChannel)
    }

    /// Removes `sid` from the namespace's socket table, the last DISCONNECT
    /// step (spec.md §4.5): runs after `del_all_rooms` and the `disconnect`
    /// handler.
    pub(crate) fn remove_socket(&self, sid: Sid) {
        self.sockets.write().unwrap().remove(&sid);
    }

    /// Detaches and tears down every socket in the namespace, closing each
    /// one's underlying engine.io session too: a full server shutdown
    /// (spec.md §4.6's "server shutting down" reason), not just a namespace
    /// detach.
    pub(crate) async fn close(&self) {
        let sockets: Vec<_> = self.sockets.read().unwrap().values().cloned().collect();
        for socket in sockets {
            let _ = socket.clone().close(DisconnectReason::ClosingServer);
            socket.close_underlying_transport().await;
        }
    }

    #[cfg(test)]
    pub fn new_dummy(sids: impl IntoIterator<Item = Sid>) -> Self {
        let ns = Self {
            path: "/".into(),
            adapter: A::new(),
            config: Arc::new(SocketIoConfig::default()),
            sockets: RwLock::new(HashMap::new()),
            connect_handler: RwLock::new(None),
            middleware: RwLock::new(Vec::new()),
            on_any: RwLock::new(Vec::new()),
            on_any_outgoing: RwLock::new(Vec::new()),
        };
        for sid in sids {
            ns.adapter.add_all(sid, sid.to_string()).ok();
        }
        ns
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::adapter::LocalAdapter;
    use crate::extract::SocketRef;

    #[tokio::test]
    async fn connect_runs_middleware_then_connect_handler() {
        let ns: Arc<Namespace<LocalAdapter>> = Namespace::new("/".into(), Arc::new(SocketIoConfig::default()));
        let seen = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let seen2 = seen.clone();
        ns.add_middleware(Box::new(|_socket, _auth| Ok(())));
        ns.on_connect(move |_socket: SocketRef<LocalAdapter>| {
            seen2.store(true, std::sync::atomic::Ordering::SeqCst);
        });

        let sid = Sid::new();
        let esocket = Arc::new(engineioxide::Socket::new_dummy(sid, Box::new(|_, _| {})));
        ns.connect(sid, esocket, Value::Null).unwrap();
        assert!(ns.get_socket(sid).is_some());
        assert!(seen.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failing_middleware_rejects_connect() {
        let ns: Arc<Namespace<LocalAdapter>> = Namespace::new("/".into(), Arc::new(SocketIoConfig::default()));
        ns.add_middleware(Box::new(|_socket, _auth| Err("nope".to_string())));

        let sid = Sid::new();
        let esocket = Arc::new(engineioxide::Socket::new_dummy(sid, Box::new(|_, _| {})));
        ns.connect(sid, esocket, Value::Null).unwrap();
        assert!(ns.get_socket(sid).is_none());
    }
}
