//! The glue between `engineioxide` and the namespace/socket layer: decodes
//! inbound Engine.IO frames into Socket.IO [`Packet`]s, runs CONNECT through
//! the right [`Namespace`], and reassembles multipart binary events
//! (spec.md §4.5/§6). `Client<A>` is the `EngineIoHandler` every
//! [`SocketIo`](crate::io::SocketIo) instance installs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use engineioxide::handler::EngineIoHandler;
use engineioxide::DisconnectReason as EIoDisconnectReason;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::adapter::Adapter;
use crate::ns::Namespace;
use crate::packet::{Packet, PacketData};
use crate::socket::DisconnectReason;
use crate::SocketIoConfig;

/// Per-Engine.IO-session state threaded through `socket.data`: the one
/// in-flight binary packet awaiting its attachments, and the handle used to
/// cancel the connect-timeout task once a CONNECT packet actually arrives.
#[derive(Default)]
pub struct SocketData {
    partial_bin_packet: Mutex<Option<Packet<'static>>>,
    connect_recv_tx: Mutex<Option<oneshot::Sender<()>>>,
}

/// Owns every namespace for one server. Cheap to clone: `engineioxide`'s
/// `EngineIoLayer` hands a clone of the handler to every accepted
/// connection, so the namespace table lives behind an `Arc`.
pub struct Client<A: Adapter> {
    config: Arc<SocketIoConfig>,
    ns: Arc<RwLock<HashMap<String, Arc<Namespace<A>>>>>,
}

impl<A: Adapter> Clone for Client<A> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            ns: self.ns.clone(),
        }
    }
}

impl<A: Adapter> Client<A> {
    pub fn new(config: Arc<SocketIoConfig>) -> Self {
        Self {
            config,
            ns: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the namespace at `path`, creating it (with no connect handler
    /// registered yet) if it doesn't exist.
    pub fn of(&self, path: impl Into<String>) -> Arc<Namespace<A>> {
        let path = path.into();
        if let Some(ns) = self.ns.read().unwrap().get(&path) {
            return ns.clone();
        }
        self.ns
            .write()
            .unwrap()
            .entry(path.clone())
            .or_insert_with(|| Namespace::new(path, self.config.clone()))
            .clone()
    }

    /// Looks up a namespace without creating it. A client CONNECT to a path
    /// that was never registered gets `Packet::invalid_namespace` back
    /// (spec.md §4.5 step 2): namespaces only come into being through
    /// [`crate::io::SocketIo::ns`]/[`Client::of`], never implicitly from a
    /// client's own CONNECT.
    fn get_ns(&self, path: &str) -> Option<Arc<Namespace<A>>> {
        self.ns.read().unwrap().get(path).cloned()
    }

    pub fn namespaces(&self) -> Vec<Arc<Namespace<A>>> {
        self.ns.read().unwrap().values().cloned().collect()
    }

    /// Disconnects every socket in every namespace.
    pub async fn close(&self) {
        for ns in self.namespaces() {
            ns.close().await;
        }
    }

    fn spawn_connect_timeout_task(&self, esocket: Arc<engineioxide::Socket<SocketData>>) {
        let (tx, rx) = oneshot::channel();
        esocket.data.connect_recv_tx.lock().unwrap().replace(tx);
        let timeout = self.config.connect_timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = rx => {}
                _ = tokio::time::sleep(timeout) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("no CONNECT packet within {:?}, closing {}", timeout, esocket.id);
                    esocket.close(EIoDisconnectReason::TransportError);
                }
            }
        });
    }

    /// Handles a decoded `CONNECT` packet: parses the optional auth payload,
    /// rejects unknown namespaces, and otherwise hands off to
    /// [`Namespace::connect`] (spec.md §4.5 steps 2-4).
    fn sock_connect(&self, auth_payload: Option<String>, ns_path: String, esocket: Arc<engineioxide::Socket<SocketData>>) {
        if let Some(tx) = esocket.data.connect_recv_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }

        let Some(ns) = self.get_ns(&ns_path) else {
            #[cfg(feature = "tracing")]
            tracing::debug!("client requested unknown namespace {ns_path}");
            send_engine_packet(&esocket, Packet::invalid_namespace(ns_path));
            return;
        };

        let auth = match auth_payload {
            Some(raw) => serde_json::from_str(&raw).unwrap_or(Value::Null),
            None => Value::Null,
        };

        if ns.connect(esocket.id, esocket.clone(), auth).is_err() {
            esocket.close(EIoDisconnectReason::PacketParsingError);
        }
    }

    /// Routes a fully-assembled packet body to the namespace/socket it
    /// belongs to, closing the transport if the error is one that should
    /// cascade (spec.md §7's propagation policy).
    fn sock_propagate_packet(&self, packet: Packet<'static>, esocket: &Arc<engineioxide::Socket<SocketData>>) {
        let Some(ns) = self.get_ns(&packet.ns) else {
            return;
        };
        if let Err(e) = ns.recv(esocket.id, packet.inner) {
            if let Some(reason) = e.as_disconnect_reason() {
                esocket.close(reason);
            }
        }
    }

    /// Stores a partial binary packet on `esocket.data`, flushing it to its
    /// namespace immediately if it turns out to need no attachments at all.
    fn store_partial_binary(&self, packet: Packet<'static>, esocket: &Arc<engineioxide::Socket<SocketData>>) {
        esocket.data.partial_bin_packet.lock().unwrap().replace(packet);
        self.maybe_flush_binary(esocket);
    }

    /// Decodes a standalone compact hot-event frame and dispatches it as an
    /// ordinary event on the default namespace (the compact framing carries
    /// no namespace segment, spec.md §4.1/§6/§9). Silently dropped if it
    /// doesn't decode, the default namespace isn't registered, or the body
    /// doesn't match the event's expected payload shape.
    fn dispatch_registry_frame(&self, data: &[u8], esocket: &Arc<engineioxide::Socket<SocketData>>) {
        let Ok((event, body)) = crate::binary_registry::decode(data) else {
            return;
        };
        let Ok(payload) = crate::binary_registry::decode_payload(event, &body) else {
            return;
        };
        let value = match payload {
            crate::binary_registry::Payload::Text(s) => Value::String(s),
            crate::binary_registry::Payload::Number(n) => serde_json::json!(n),
        };
        let Some(ns) = self.get_ns("/") else {
            return;
        };
        let packet = PacketData::Event(std::borrow::Cow::Borrowed(event.name()), value, None);
        if let Err(e) = ns.recv(esocket.id, packet) {
            if let Some(reason) = e.as_disconnect_reason() {
                esocket.close(reason);
            }
        }
    }

    fn maybe_flush_binary(&self, esocket: &Arc<engineioxide::Socket<SocketData>>) {
        let mut slot = esocket.data.partial_bin_packet.lock().unwrap();
        let complete = match slot.as_ref().map(|p| &p.inner) {
            Some(PacketData::BinaryEvent(_, bin, _)) => bin.is_complete(),
            Some(PacketData::BinaryAck(bin, _)) => bin.is_complete(),
            _ => false,
        };
        if !complete {
            return;
        }
        let packet = slot.take().expect("checked Some above");
        drop(slot);
        self.sock_propagate_packet(packet, esocket);
    }
}

fn send_engine_packet(esocket: &Arc<engineioxide::Socket<SocketData>>, packet: Packet<'_>) {
    if let Ok(msg) = TryInto::<String>::try_into(packet) {
        let _ = esocket.emit(msg);
    }
}

impl<A: Adapter> EngineIoHandler for Client<A> {
    type Data = SocketData;

    fn on_connect(&self, socket: Arc<engineioxide::Socket<Self::Data>>) {
        #[cfg(feature = "tracing")]
        tracing::debug!("engine.io socket connected: {}", socket.id);
        self.spawn_connect_timeout_task(socket);
    }

    fn on_disconnect(&self, socket: Arc<engineioxide::Socket<Self::Data>>, reason: EIoDisconnectReason) {
        #[cfg(feature = "tracing")]
        tracing::debug!("engine.io socket disconnected: {} ({reason})", socket.id);
        let reason: DisconnectReason = reason.into();
        for ns in self.namespaces() {
            if let Some(sock) = ns.get_socket(socket.id) {
                let _ = sock.close(reason);
            }
        }
    }

    fn on_message(&self, msg: String, socket: Arc<engineioxide::Socket<Self::Data>>) {
        let packet: Packet<'static> = match msg.try_into() {
            Ok(p) => p,
            Err(_) => {
                socket.close(EIoDisconnectReason::PacketParsingError);
                return;
            }
        };
        match packet.inner {
            PacketData::Connect(auth) => {
                let ns_path = packet.ns.into_owned();
                self.sock_connect(auth, ns_path, socket);
            }
            PacketData::BinaryEvent(..) | PacketData::BinaryAck(..) => {
                self.store_partial_binary(packet, &socket);
            }
            _ => self.sock_propagate_packet(packet, &socket),
        }
    }

    /// A raw binary frame is either an attachment for a pending
    /// `BinaryEvent`/`BinaryAck` packet, or (if none is pending and the frame
    /// carries the registry's magic prefix) a standalone compact hot-event
    /// frame (spec.md §4.1/§6/§9).
    fn on_binary(&self, data: Vec<u8>, socket: Arc<engineioxide::Socket<Self::Data>>) {
        let has_pending_packet = socket.data.partial_bin_packet.lock().unwrap().is_some();
        if has_pending_packet {
            {
                let mut slot = socket.data.partial_bin_packet.lock().unwrap();
                match slot.as_mut().map(|p| &mut p.inner) {
                    Some(PacketData::BinaryEvent(_, bin, _)) => bin.add_payload(data),
                    Some(PacketData::BinaryAck(bin, _)) => bin.add_payload(data),
                    _ => {}
                }
            }
            self.maybe_flush_binary(&socket);
        } else if crate::binary_registry::is_binary_frame(&data) {
            self.dispatch_registry_frame(&data, &socket);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::adapter::LocalAdapter;

    #[test]
    fn of_creates_namespace_once() {
        let client: Client<LocalAdapter> = Client::new(Arc::new(SocketIoConfig::default()));
        let a = client.of("/chat");
        let b = client.of("/chat");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn get_ns_does_not_create() {
        let client: Client<LocalAdapter> = Client::new(Arc::new(SocketIoConfig::default()));
        assert!(client.get_ns("/missing").is_none());
    }

    #[test]
    fn clone_shares_the_namespace_table() {
        let client: Client<LocalAdapter> = Client::new(Arc::new(SocketIoConfig::default()));
        let clone = client.clone();
        client.of("/a");
        assert!(clone.get_ns("/a").is_some());
    }
}
