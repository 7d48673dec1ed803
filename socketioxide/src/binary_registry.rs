//! A compact binary framing used in place of the text path for a small, fixed
//! set of hot event names (spec.md §4.1/§6/§9). A frame is binary if its
//! first byte is the magic `0xFF` followed by a version byte; text frames
//! never start with `0xFF` since Engine.IO text frames always open with an
//! ASCII digit. Events outside the registry, or payloads over 255 bytes, fall
//! back to the ordinary text path — the cap is deliberate (§9 Open Question)
//! and is not meant to carry arbitrary payloads.
//!
//! Outbound, [`crate::operators::Operators::emit`] calls [`encode`] when
//! `.bin(true)` was requested and the event/payload shape allows it. Inbound,
//! [`crate::client::Client::on_binary`] calls [`is_binary_frame`]/[`decode`]
//! for any raw binary frame that isn't an attachment to a pending
//! `BinaryEvent`/`BinaryAck` packet.

const MAGIC: u8 = 0xFF;
const VERSION: u8 = 0x01;

/// Codes for the registry's fixed hot events. Both peers must agree on this
/// table; it is not negotiated on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HotEvent {
    Ping = 1,
    Pong = 2,
    Message = 3,
    Notification = 4,
}

impl HotEvent {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(HotEvent::Ping),
            2 => Some(HotEvent::Pong),
            3 => Some(HotEvent::Message),
            4 => Some(HotEvent::Notification),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ping" => Some(HotEvent::Ping),
            "pong" => Some(HotEvent::Pong),
            "message" => Some(HotEvent::Message),
            "notification" => Some(HotEvent::Notification),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HotEvent::Ping => "ping",
            HotEvent::Pong => "pong",
            HotEvent::Message => "message",
            HotEvent::Notification => "notification",
        }
    }

    /// The payload shape this event carries on the compact path: `ping`/`pong`
    /// are numeric (e.g. a timestamp), `message`/`notification` are text.
    /// Fixed per event rather than tagged on the wire, since the registry
    /// itself is the only source of truth both peers share.
    pub fn expects_numeric(self) -> bool {
        matches!(self, HotEvent::Ping | HotEvent::Pong)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BinaryEncodeError {
    #[error("payload too large for the binary registry path: {len} > 255 bytes")]
    PayloadTooLarge { len: usize },
    #[error("event not in the binary registry")]
    EventNotRegistered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BinaryDecodeError {
    #[error("frame too short to be a binary registry frame")]
    Truncated,
    #[error("unsupported binary framing version")]
    UnsupportedVersion,
    #[error("unregistered event code: {0}")]
    UnregisteredCode(u8),
}

/// Payload carried by a hot-event binary frame: text events carry UTF-8,
/// numeric events carry a 4-byte little-endian IEEE-754 float.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Number(f32),
}

impl Payload {
    fn encode(&self) -> Vec<u8> {
        match self {
            Payload::Text(s) => s.as_bytes().to_vec(),
            Payload::Number(n) => n.to_le_bytes().to_vec(),
        }
    }
}

/// True if `bytes` opens with the binary registry magic + version prefix.
pub fn is_binary_frame(bytes: &[u8]) -> bool {
    bytes.first() == Some(&MAGIC)
}

/// Encodes `event` + `payload` using the compact registry framing. Returns
/// `Err` (caller should fall back to the text path) when the event is not
/// registered or the payload exceeds the single-byte length cap.
pub fn encode(event: HotEvent, payload: &Payload) -> Result<Vec<u8>, BinaryEncodeError> {
    let body = payload.encode();
    let len: u8 = body
        .len()
        .try_into()
        .map_err(|_| BinaryEncodeError::PayloadTooLarge { len: body.len() })?;
    let mut out = Vec::with_capacity(4 + body.len());
    out.push(MAGIC);
    out.push(VERSION);
    out.push(event.code());
    out.push(len);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decodes a frame previously produced by [`encode`]. `is_numeric` picks
/// which payload shape to expect for the decoded event code, since the wire
/// format carries no type tag beyond the event registry entry itself.
pub fn decode(bytes: &[u8]) -> Result<(HotEvent, Vec<u8>), BinaryDecodeError> {
    if bytes.len() < 4 {
        return Err(BinaryDecodeError::Truncated);
    }
    if bytes[0] != MAGIC {
        return Err(BinaryDecodeError::Truncated);
    }
    if bytes[1] != VERSION {
        return Err(BinaryDecodeError::UnsupportedVersion);
    }
    let event = HotEvent::from_code(bytes[2]).ok_or(BinaryDecodeError::UnregisteredCode(bytes[2]))?;
    let len = bytes[3] as usize;
    let body = bytes.get(4..4 + len).ok_or(BinaryDecodeError::Truncated)?;
    Ok((event, body.to_vec()))
}

pub fn decode_text(body: &[u8]) -> Result<String, BinaryDecodeError> {
    String::from_utf8(body.to_vec()).map_err(|_| BinaryDecodeError::Truncated)
}

pub fn decode_number(body: &[u8]) -> Result<f32, BinaryDecodeError> {
    let arr: [u8; 4] = body.try_into().map_err(|_| BinaryDecodeError::Truncated)?;
    Ok(f32::from_le_bytes(arr))
}

/// Decodes `body` into the [`Payload`] shape `event` carries, per
/// [`HotEvent::expects_numeric`].
pub fn decode_payload(event: HotEvent, body: &[u8]) -> Result<Payload, BinaryDecodeError> {
    if event.expects_numeric() {
        decode_number(body).map(Payload::Number)
    } else {
        decode_text(body).map(Payload::Text)
    }
}

/// Picks the [`Payload`] shape `event` carries from an arbitrary JSON value,
/// returning `None` when `data` doesn't fit that shape (caller should fall
/// back to the text path).
pub fn payload_from_value(event: HotEvent, data: &serde_json::Value) -> Option<Payload> {
    if event.expects_numeric() {
        data.as_f64().map(|n| Payload::Number(n as f32))
    } else {
        data.as_str().map(|s| Payload::Text(s.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_decode_round_trips_text() {
        let payload = Payload::Text("hi".into());
        let bytes = encode(HotEvent::Notification, &payload).unwrap();
        assert!(is_binary_frame(&bytes));
        let (event, body) = decode(&bytes).unwrap();
        assert_eq!(event, HotEvent::Notification);
        assert_eq!(decode_text(&body).unwrap(), "hi");
    }

    #[test]
    fn encode_decode_round_trips_number() {
        let payload = Payload::Number(3.5);
        let bytes = encode(HotEvent::Ping, &payload).unwrap();
        let (event, body) = decode(&bytes).unwrap();
        assert_eq!(event, HotEvent::Ping);
        assert_eq!(decode_number(&body).unwrap(), 3.5);
    }

    #[test]
    fn payload_over_255_bytes_falls_back_to_text_path() {
        let payload = Payload::Text("x".repeat(256));
        let err = encode(HotEvent::Message, &payload).unwrap_err();
        assert_eq!(err, BinaryEncodeError::PayloadTooLarge { len: 256 });
    }

    #[test]
    fn unregistered_code_is_rejected() {
        let bytes = vec![MAGIC, VERSION, 99, 0];
        assert_eq!(decode(&bytes).unwrap_err(), BinaryDecodeError::UnregisteredCode(99));
    }

    #[test]
    fn text_frames_never_look_binary() {
        assert!(!is_binary_frame(b"42[\"a\"]"));
    }

    #[test]
    fn encode_then_decode_round_trips_via_json_value() {
        let value = serde_json::json!("hi there");
        let payload = payload_from_value(HotEvent::Message, &value).unwrap();
        let frame = encode(HotEvent::Message, &payload).unwrap();
        let (event, body) = decode(&frame).unwrap();
        assert_eq!(decode_payload(event, &body).unwrap(), payload);
    }

    #[test]
    fn ping_pong_carry_numeric_payloads_not_text() {
        let value = serde_json::json!("not a number");
        assert!(payload_from_value(HotEvent::Ping, &value).is_none());
    }
}
