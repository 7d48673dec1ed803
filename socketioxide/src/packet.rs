//! The Socket.IO v5 packet: `CONNECT`/`DISCONNECT`/`EVENT`/`ACK`/`CONNECT_ERROR`/
//! `BINARY_EVENT`/`BINARY_ACK`, wrapped inside an Engine.IO `MESSAGE` frame.
//!
//! Wire shape (spec.md §6): `4<type>[<namespace>,][<ackId>]<payload>` where
//! `<type>` is one digit, `<namespace>` is only present for non-default
//! namespaces and always comma-terminated, `<ackId>` is a bare run of decimal
//! digits, and `<payload>` is a JSON array: `[eventName, data]` for `EVENT`,
//! `[data]` for `ACK`. Binary variants carry a `<n>-` attachment count ahead
//! of the namespace/ackId segments and use an `_placeholder` object in the
//! JSON payload at the point each attachment belongs, matching the real
//! protocol's binary envelope.

use std::borrow::Cow;

use serde_json::Value;

use crate::errors::Error;

/// One Socket.IO packet: a type-tagged payload bound to a namespace.
#[derive(Debug, Clone)]
pub struct Packet<'a> {
    pub ns: Cow<'a, str>,
    pub inner: PacketData<'a>,
}

/// A binary-bearing packet's JSON payload plus the attachments it references.
/// Attachments are carried out-of-band as separate Engine.IO binary frames;
/// `bin` accumulates them in arrival order while the packet is partially
/// received.
#[derive(Debug, Clone, Default)]
pub struct BinaryPacket {
    pub data: Value,
    pub bin: Vec<Vec<u8>>,
    pub(crate) expected: usize,
}

impl BinaryPacket {
    pub(crate) fn is_complete(&self) -> bool {
        self.bin.len() >= self.expected
    }

    pub(crate) fn add_payload(&mut self, payload: Vec<u8>) {
        self.bin.push(payload);
    }
}

#[derive(Debug, Clone)]
pub enum PacketData<'a> {
    Connect(Option<String>),
    ConnectError(String),
    Disconnect,
    Event(Cow<'a, str>, Value, Option<i64>),
    EventAck(Value, i64),
    BinaryEvent(Cow<'a, str>, BinaryPacket, Option<i64>),
    BinaryAck(BinaryPacket, i64),
}

impl<'a> PacketData<'a> {
    pub(crate) fn set_ack_id(&mut self, ack_id: i64) {
        match self {
            PacketData::Event(_, _, ack) | PacketData::BinaryEvent(_, _, ack) => {
                *ack = Some(ack_id)
            }
            _ => {}
        }
    }

    fn type_digit(&self) -> u8 {
        match self {
            PacketData::Connect(_) => b'0',
            PacketData::Disconnect => b'1',
            PacketData::Event(..) | PacketData::BinaryEvent(..) => b'2',
            PacketData::EventAck(..) | PacketData::BinaryAck(..) => b'3',
            PacketData::ConnectError(_) => b'4',
        }
    }

    fn is_binary(&self) -> bool {
        matches!(self, PacketData::BinaryEvent(..) | PacketData::BinaryAck(..))
    }
}

impl<'a> Packet<'a> {
    pub fn connect(ns: impl Into<Cow<'a, str>>, sid: engineioxide::Sid) -> Self {
        let payload = serde_json::json!({ "sid": sid.to_string() }).to_string();
        Packet {
            ns: ns.into(),
            inner: PacketData::Connect(Some(payload)),
        }
    }

    pub fn invalid_namespace(ns: impl Into<Cow<'a, str>>) -> Self {
        Self::connect_error(ns, "Invalid namespace")
    }

    pub fn connect_error(ns: impl Into<Cow<'a, str>>, message: impl Into<String>) -> Self {
        Packet {
            ns: ns.into(),
            inner: PacketData::ConnectError(message.into()),
        }
    }

    pub fn disconnect(ns: impl Into<Cow<'a, str>>) -> Self {
        Packet {
            ns: ns.into(),
            inner: PacketData::Disconnect,
        }
    }

    pub fn event(ns: impl Into<Cow<'a, str>>, event: impl Into<Cow<'a, str>>, data: Value) -> Self {
        Packet {
            ns: ns.into(),
            inner: PacketData::Event(event.into(), data, None),
        }
    }

    pub fn ack(ns: impl Into<Cow<'a, str>>, data: Value, ack_id: i64) -> Self {
        Packet {
            ns: ns.into(),
            inner: PacketData::EventAck(data, ack_id),
        }
    }

    pub fn bin_ack(ns: impl Into<Cow<'a, str>>, data: Value, bin: Vec<Vec<u8>>, ack_id: i64) -> Self {
        let expected = bin.len();
        Packet {
            ns: ns.into(),
            inner: PacketData::BinaryAck(BinaryPacket { data, bin, expected }, ack_id),
        }
    }

    pub fn bin_event(
        ns: impl Into<Cow<'a, str>>,
        event: impl Into<Cow<'a, str>>,
        data: Value,
        bin: Vec<Vec<u8>>,
    ) -> Self {
        let expected = bin.len();
        Packet {
            ns: ns.into(),
            inner: PacketData::BinaryEvent(event.into(), BinaryPacket { data, bin, expected }, None),
        }
    }
}

impl<'a> TryFrom<Packet<'a>> for String {
    type Error = serde_json::Error;

    /// Encodes a packet into its Engine.IO `MESSAGE` text frame.
    fn try_from(packet: Packet<'a>) -> Result<Self, Self::Error> {
        let mut out = String::from("4");
        out.push(packet.inner.type_digit() as char);
        if packet.inner.is_binary() {
            let count = match &packet.inner {
                PacketData::BinaryEvent(_, bin, _) | PacketData::BinaryAck(bin, _) => bin.bin.len(),
                _ => unreachable!(),
            };
            out.push_str(&count.to_string());
            out.push('-');
        }
        if packet.ns != "/" && !packet.ns.is_empty() {
            out.push_str(&packet.ns);
            out.push(',');
        }
        match &packet.inner {
            PacketData::Connect(Some(payload)) => out.push_str(payload),
            PacketData::Connect(None) => {}
            PacketData::ConnectError(msg) => {
                out.push_str(&serde_json::json!({ "message": msg }).to_string())
            }
            PacketData::Disconnect => {}
            PacketData::Event(event, data, ack) => {
                if let Some(ack) = ack {
                    out.push_str(&ack.to_string());
                }
                let payload = Value::Array(vec![Value::String(event.clone().into_owned()), data.clone()]);
                out.push_str(&serde_json::to_string(&payload)?);
            }
            PacketData::EventAck(data, ack) => {
                out.push_str(&ack.to_string());
                out.push_str(&serde_json::to_string(&Value::Array(vec![data.clone()]))?);
            }
            PacketData::BinaryEvent(event, bin, ack) => {
                if let Some(ack) = ack {
                    out.push_str(&ack.to_string());
                }
                let payload = Value::Array(vec![Value::String(event.clone().into_owned()), bin.data.clone()]);
                out.push_str(&serde_json::to_string(&payload)?);
            }
            PacketData::BinaryAck(bin, ack) => {
                out.push_str(&ack.to_string());
                out.push_str(&serde_json::to_string(&Value::Array(vec![bin.data.clone()]))?);
            }
        }
        Ok(out)
    }
}

impl<'a> TryFrom<String> for Packet<'a> {
    type Error = Error;

    fn try_from(frame: String) -> Result<Self, Self::Error> {
        parse(&frame)
    }
}

fn parse<'a>(frame: &str) -> Result<Packet<'a>, Error> {
    let type_digit = frame.chars().next().ok_or_else(malformed)?;
    let mut rest = &frame[type_digit.len_utf8()..];

    let is_binary = matches!(type_digit, '5' | '6');
    let mut attachment_count = 0usize;
    if is_binary {
        let dash = rest.find('-').ok_or_else(malformed)?;
        attachment_count = rest[..dash].parse().map_err(|_| malformed())?;
        rest = &rest[dash + 1..];
    }

    let ns = if rest.starts_with('/') {
        let comma = rest.find(',').ok_or_else(malformed)?;
        let ns = rest[..comma].to_string();
        rest = &rest[comma + 1..];
        ns
    } else {
        "/".to_string()
    };

    let digit_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let ack_id = if digit_end > 0 {
        Some(rest[..digit_end].parse::<i64>().map_err(|_| malformed())?)
    } else {
        None
    };
    rest = &rest[digit_end..];

    let inner = match type_digit {
        '0' => {
            let payload = if rest.is_empty() { None } else { Some(rest.to_string()) };
            PacketData::Connect(payload)
        }
        '1' => PacketData::Disconnect,
        '2' | '5' => {
            let mut arr = parse_array(rest)?;
            if arr.is_empty() {
                return Err(malformed());
            }
            let event = arr.remove(0);
            let Value::String(event) = event else {
                return Err(malformed());
            };
            let data = if arr.is_empty() { Value::Null } else { arr.remove(0) };
            if is_binary {
                let bin = BinaryPacket {
                    data,
                    bin: Vec::with_capacity(attachment_count),
                    expected: attachment_count,
                };
                PacketData::BinaryEvent(Cow::Owned(event), bin, ack_id)
            } else {
                PacketData::Event(Cow::Owned(event), data, ack_id)
            }
        }
        '3' | '6' => {
            let mut arr = parse_array(rest)?;
            let data = if arr.is_empty() { Value::Null } else { arr.remove(0) };
            let ack_id = ack_id.ok_or_else(malformed)?;
            if is_binary {
                let bin = BinaryPacket {
                    data,
                    bin: Vec::with_capacity(attachment_count),
                    expected: attachment_count,
                };
                PacketData::BinaryAck(bin, ack_id)
            } else {
                PacketData::EventAck(data, ack_id)
            }
        }
        '4' => {
            let msg = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .unwrap_or_default();
            PacketData::ConnectError(msg)
        }
        _ => return Err(malformed()),
    };

    Ok(Packet {
        ns: Cow::Owned(ns),
        inner,
    })
}

fn parse_array(rest: &str) -> Result<Vec<Value>, Error> {
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(rest)? {
        Value::Array(arr) => Ok(arr),
        _ => Err(malformed()),
    }
}

fn malformed() -> Error {
    Error::InvalidPacket(serde_json::from_str::<Value>("{").unwrap_err())
}
