//! Typed extractors for message/connect handlers: [`SocketRef`], [`Data`],
//! [`TryData`], [`Bin`], [`AckSender`]. Mirrors the pattern in the retrieved
//! `step-finance-socketioxide/socketioxide/src/socket.rs` doc examples
//! (`socket.on("test", |socket: SocketRef, Data::<MyData>(data)| ...)`),
//! which is the idiomatic Rust realization of spec.md §4.6's "registered
//! listeners for `eventName`" (no call signature is prescribed there).

use std::ops::Deref;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::adapter::Adapter;
use crate::ack::AckResponse;
use crate::errors::Error;
use crate::handler::MessageParts;
use crate::packet::Packet;
use crate::socket::Socket;

/// Implemented for every extractable type; `from_message_parts` may reject
/// the dispatch (returning `Err`), in which case the handler is simply not
/// invoked for that packet (mirrors `Data<T>`'s "only called if it
/// deserializes" contract).
pub trait FromMessageParts<A: Adapter>: Sized {
    fn from_message_parts(socket: &Arc<Socket<A>>, parts: &MessageParts) -> Result<Self, Error>;
}

/// A cheap handle to the socket the event arrived on. Always available,
/// never fails to extract.
#[derive(Clone)]
pub struct SocketRef<A: Adapter = crate::adapter::LocalAdapter>(Arc<Socket<A>>);

impl<A: Adapter> SocketRef<A> {
    pub fn as_arc(&self) -> Arc<Socket<A>> {
        self.0.clone()
    }
}

impl<A: Adapter> Deref for SocketRef<A> {
    type Target = Socket<A>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<A: Adapter> FromMessageParts<A> for SocketRef<A> {
    fn from_message_parts(socket: &Arc<Socket<A>>, _parts: &MessageParts) -> Result<Self, Error> {
        Ok(SocketRef(socket.clone()))
    }
}

/// Deserializes the event's data into `T`. If deserialization fails, the
/// handler is not invoked at all (use [`TryData`] to observe the error
/// instead).
pub struct Data<T>(pub T);

impl<A: Adapter, T: DeserializeOwned> FromMessageParts<A> for Data<T> {
    fn from_message_parts(_socket: &Arc<Socket<A>>, parts: &MessageParts) -> Result<Self, Error> {
        Ok(Data(serde_json::from_value(parts.data.clone())?))
    }
}

/// Like [`Data`] but never rejects dispatch: the handler receives the
/// `Result` and can react to malformed input itself.
pub struct TryData<T>(pub Result<T, serde_json::Error>);

impl<A: Adapter, T: DeserializeOwned> FromMessageParts<A> for TryData<T> {
    fn from_message_parts(_socket: &Arc<Socket<A>>, parts: &MessageParts) -> Result<Self, Error> {
        Ok(TryData(serde_json::from_value(parts.data.clone())))
    }
}

/// The binary attachments that arrived alongside this event, if any.
pub struct Bin(pub Vec<Vec<u8>>);

impl<A: Adapter> FromMessageParts<A> for Bin {
    fn from_message_parts(_socket: &Arc<Socket<A>>, parts: &MessageParts) -> Result<Self, Error> {
        Ok(Bin(parts.bin.clone()))
    }
}

/// A bound ack callback. Calling [`AckSender::send`] is idempotent-ish: only
/// the first call is actually delivered (spec.md §4.6 item 2); later calls
/// are silently ignored since the ack id has already been consumed.
pub struct AckSender<A: Adapter = crate::adapter::LocalAdapter> {
    socket: Arc<Socket<A>>,
    ack_id: Option<i64>,
    binary: Vec<Vec<u8>>,
}

impl<A: Adapter> AckSender<A> {
    /// Attaches binary payloads to be sent alongside the ack value.
    pub fn bin(mut self, binary: Vec<Vec<u8>>) -> Self {
        self.binary = binary;
        self
    }

    /// Sends the ack response. A no-op if this handler's packet carried no
    /// ack id (i.e. the client did not ask for one).
    pub fn send(self, data: impl serde::Serialize) -> Result<(), Error> {
        let Some(ack_id) = self.ack_id else {
            return Ok(());
        };
        let data = serde_json::to_value(data)?;
        let packet = if self.binary.is_empty() {
            Packet::ack(self.socket.ns().to_string(), data, ack_id)
        } else {
            Packet::bin_ack(self.socket.ns().to_string(), data, self.binary, ack_id)
        };
        self.socket.send(packet).map_err(Error::from)
    }
}

impl<A: Adapter> FromMessageParts<A> for AckSender<A> {
    fn from_message_parts(socket: &Arc<Socket<A>>, parts: &MessageParts) -> Result<Self, Error> {
        Ok(AckSender {
            socket: socket.clone(),
            ack_id: parts.ack,
            binary: Vec::new(),
        })
    }
}

/// Escape hatch used by `emit_with_ack`'s return type when the value needs
/// re-exporting at the extract boundary.
pub type AckValue = AckResponse;
