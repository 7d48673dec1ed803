//! The broadcast operator (spec.md §4.7): an immutable selector + flags +
//! optional timeout value with no identity of its own — every builder method
//! returns a new value.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use engineioxide::Sid;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;

use crate::ack::{AckInnerStream, AckStream};
use crate::adapter::{Adapter, Room, RoomParam};
use crate::binary_registry;
use crate::errors::SendError;
use crate::ns::Namespace;
use crate::packet::Packet;

/// A lightweight read view over a socket matched by an operator's selector,
/// returned from [`Operators::fetch_sockets`]. Carries enough to inspect or
/// further act on the match without exposing the full `Socket`.
#[derive(Debug, Clone)]
pub struct RemoteSocket {
    pub id: Sid,
    pub rooms: Vec<Room>,
}

/// Immutable broadcast-selector + flags builder. Every method consumes
/// `self` and returns a new `Operators`, matching spec.md §3's "the operator
/// has no identity".
pub struct Operators<A: Adapter> {
    ns: Arc<Namespace<A>>,
    sender: Option<Sid>,
    include: Vec<Room>,
    exclude: Vec<Room>,
    local: bool,
    volatile: bool,
    /// When set, `emit` tries the compact hot-event binary framing before
    /// falling back to the text path (spec.md §4.7 step 3).
    binary: bool,
    timeout: Option<Duration>,
}

impl<A: Adapter> Operators<A> {
    pub(crate) fn new(ns: Arc<Namespace<A>>, sender: Option<Sid>) -> Self {
        let exclude = sender.map(|s| vec![s.to_string()]).unwrap_or_default();
        Self {
            ns,
            sender,
            include: Vec::new(),
            exclude,
            local: false,
            volatile: false,
            binary: false,
            timeout: None,
        }
    }

    /// Selects clients in `rooms`, excluding the sender (if any) per spec.md
    /// §4.6's `to`/`in`.
    pub fn to(mut self, rooms: impl RoomParam) -> Self {
        self.include.extend(rooms.into_room_iter());
        self
    }

    /// Alias of [`to`](Self::to): spec.md §4.6 lists `in` as a plain alias,
    /// excluding the sender the same way.
    pub fn within(self, rooms: impl RoomParam) -> Self {
        self.to(rooms)
    }

    pub fn except(mut self, rooms: impl RoomParam) -> Self {
        self.exclude.extend(rooms.into_room_iter());
        self
    }

    /// No-op with the in-memory [`crate::adapter::LocalAdapter`]; kept for
    /// API parity with a future distributed adapter, per spec.md §1.
    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }

    /// Marks the emit volatile: dropped (not queued) on a non-writable
    /// session rather than buffered (spec.md §4.6/§4.7).
    pub fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }

    /// Requests the compact hot-event binary framing for this emit (spec.md
    /// §4.1/§6/§9): selected only when `event` is in the fixed hot-event
    /// registry and its payload fits the registry's shape and size cap;
    /// otherwise `emit` falls back to the ordinary text path regardless of
    /// this flag. This is unrelated to the Socket.IO binary-attachment
    /// mechanism (`BinaryEvent`/`BinaryAck`, see
    /// [`crate::extract::Bin`]/[`Packet::bin_event`]/[`AckSender::bin`](crate::extract::AckSender::bin)),
    /// which carries out-of-band payloads alongside an ordinary text packet.
    pub fn bin(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// `broadcast()` excludes only the sender, with no room restriction
    /// (spec.md §4.6's "shorthand for a builder that excludes self").
    pub fn broadcast(self) -> Self {
        self
    }

    fn candidates(&self) -> HashSet<Sid> {
        self.ns.adapter.candidates(&self.include, &self.exclude).unwrap_or_default()
    }

    /// Emission algorithm (spec.md §4.7): resolve candidates, encode once,
    /// push to each candidate's session buffer, honoring `volatile`.
    ///
    /// When `.bin(true)` was requested and `event` is a registered hot event
    /// whose payload fits the compact shape (spec.md §4.7 step 3), every
    /// candidate gets the compact binary frame instead of a text packet;
    /// otherwise the ordinary text path is used for all of them.
    pub fn emit(&self, event: impl Into<Cow<'static, str>>, data: impl Serialize) -> Result<(), SendError> {
        let event = event.into();
        let data = serde_json::to_value(data)?;
        let compact_frame = self.compact_frame(&event, &data);
        let candidates = self.candidates();
        for sid in candidates {
            let Some(socket) = self.ns.get_socket(sid) else { continue };
            if self.volatile && !socket.is_writable() {
                continue;
            }
            match &compact_frame {
                Some(frame) => {
                    let _ = socket.send_binary_frame(frame.clone());
                }
                None => {
                    let packet = Packet::event(self.ns.path.clone(), event.clone(), data.clone());
                    let _ = socket.send(packet);
                }
            }
        }
        Ok(())
    }

    /// Encodes `event`/`data` as a compact hot-event frame when `.bin(true)`
    /// was requested and the event/payload shape allows it; `None` means
    /// "use the text path" (unregistered event, non-matching payload shape,
    /// or a payload over the registry's size cap — spec.md §9's pinned
    /// fallback-on-overflow decision).
    fn compact_frame(&self, event: &str, data: &Value) -> Option<Vec<u8>> {
        if !self.binary {
            return None;
        }
        let hot = binary_registry::HotEvent::from_name(event)?;
        let payload = binary_registry::payload_from_value(hot, data)?;
        binary_registry::encode(hot, &payload).ok()
    }

    /// Emits with an aggregate ack: one ack id per candidate, responses
    /// collected until every candidate has answered or `timeout` elapses
    /// (spec.md §4.4's `broadcastWithAck`/§4.7 item 4). A candidate that
    /// disconnects mid-broadcast simply never fills its slot.
    pub fn emit_with_ack<V: serde::de::DeserializeOwned + Unpin + Send + 'static>(
        &self,
        event: impl Into<Cow<'static, str>>,
        data: impl Serialize,
    ) -> Result<impl futures::Stream<Item = Result<V, crate::errors::AckError>>, SendError> {
        let event = event.into();
        let data = serde_json::to_value(data)?;
        let timeout = self.timeout.unwrap_or(self.ns_config_ack_timeout());
        let streams: Vec<AckStream<V>> = self
            .candidates()
            .into_iter()
            .filter_map(|sid| self.ns.get_socket(sid))
            .map(|socket| {
                let packet = Packet::event(self.ns.path.clone(), event.clone(), data.clone());
                let rx = socket.send_with_ack(packet);
                AckInnerStream::send(rx, timeout).into()
            })
            .collect();
        Ok(stream::iter(streams).flatten())
    }

    fn ns_config_ack_timeout(&self) -> Duration {
        self.ns.config.ack_timeout
    }

    /// Materializes the selected set as lightweight read views (spec.md
    /// §4.7's `fetchSockets`).
    pub fn fetch_sockets(&self) -> Vec<RemoteSocket> {
        self.candidates()
            .into_iter()
            .filter_map(|sid| {
                let rooms = self.ns.adapter.socket_rooms(sid).ok()?;
                Some(RemoteSocket { id: sid, rooms })
            })
            .collect()
    }

    /// Joins every selected socket to `rooms` (spec.md §4.7's
    /// `socketsJoin`). Since the in-memory adapter always has the real
    /// socket locally, this operates directly on the bare `Sid`s rather
    /// than needing a round-trip through `fetch_sockets`.
    pub fn sockets_join(&self, rooms: impl RoomParam) -> Result<(), A::Error> {
        let rooms: Vec<Room> = rooms.into_room_iter().collect();
        for sid in self.candidates() {
            self.ns.adapter.add_all(sid, rooms.clone())?;
        }
        Ok(())
    }

    pub fn sockets_leave(&self, rooms: impl RoomParam) -> Result<(), A::Error> {
        let rooms: Vec<Room> = rooms.into_room_iter().collect();
        for sid in self.candidates() {
            self.ns.adapter.del(sid, rooms.clone())?;
        }
        Ok(())
    }

    /// Disconnects every selected socket (spec.md §4.7's
    /// `disconnectSockets`). `close=true` also tears down each socket's
    /// underlying engine.io session, matching [`Socket::disconnect`](crate::socket::Socket::disconnect)'s
    /// `close` semantics.
    pub async fn disconnect_sockets(&self, close: bool) -> Result<(), crate::errors::AdapterError> {
        let reason = if close {
            crate::socket::DisconnectReason::ForcedClose
        } else {
            crate::socket::DisconnectReason::ServerNSDisconnect
        };
        for sid in self.candidates() {
            if let Some(socket) = self.ns.get_socket(sid) {
                let _ = socket.clone().close(reason);
                if close {
                    socket.close_underlying_transport().await;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::adapter::LocalAdapter;

    #[test]
    fn to_excludes_sender_by_default() {
        let ns: Arc<Namespace<LocalAdapter>> = Arc::new(Namespace::new_dummy([]));
        let sender = Sid::new();
        let ops = Operators::new(ns, Some(sender)).to("room1".to_string());
        assert!(ops.exclude.contains(&sender.to_string()));
    }

    #[test]
    fn within_is_an_alias_of_to() {
        let ns: Arc<Namespace<LocalAdapter>> = Arc::new(Namespace::new_dummy([]));
        let sender = Sid::new();
        let ops = Operators::new(ns, Some(sender)).within("room1".to_string());
        assert!(ops.exclude.contains(&sender.to_string()));
        assert!(ops.include.contains(&"room1".to_string()));
    }

    #[test]
    fn bin_selects_compact_frame_for_registered_event() {
        let ns: Arc<Namespace<LocalAdapter>> = Arc::new(Namespace::new_dummy([]));
        let ops = Operators::new(ns, None).bin(true);
        let frame = ops.compact_frame("message", &Value::String("hi".into()));
        assert!(frame.is_some());
        assert!(binary_registry::is_binary_frame(&frame.unwrap()));
    }

    #[test]
    fn bin_false_never_selects_compact_frame() {
        let ns: Arc<Namespace<LocalAdapter>> = Arc::new(Namespace::new_dummy([]));
        let ops = Operators::new(ns, None);
        assert!(ops.compact_frame("message", &Value::String("hi".into())).is_none());
    }

    #[test]
    fn bin_falls_back_to_text_for_unregistered_event() {
        let ns: Arc<Namespace<LocalAdapter>> = Arc::new(Namespace::new_dummy([]));
        let ops = Operators::new(ns, None).bin(true);
        assert!(ops.compact_frame("custom-event", &Value::String("hi".into())).is_none());
    }
}
