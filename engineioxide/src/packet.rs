//! Engine.IO wire framing: the outer envelope that carries Socket.IO packets
//! (or plain heartbeat frames) over a single WebSocket.
//!
//! Frame shape (text path, bit-exact): a single ASCII digit prefix selects
//! the variant, followed by an optional payload.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One decoded Engine.IO frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Sent once, right after the session opens.
    Open(OpenPacket),
    /// Requests that the transport be torn down.
    Close,
    /// Heartbeat ping (bidirectional: the server is primary sender, but a
    /// client-driven ping must be answered with a pong too).
    Ping,
    /// Heartbeat pong, answers a [`Packet::Ping`].
    Pong,
    /// Wraps an opaque application (Socket.IO) payload.
    Message(String),
    /// No-op frame used only to force a flush on transports that need one;
    /// unused on the websocket-only transport but kept for wire fidelity.
    Noop,
}

impl Packet {
    fn type_digit(&self) -> u8 {
        match self {
            Packet::Open(_) => b'0',
            Packet::Close => b'1',
            Packet::Ping => b'2',
            Packet::Pong => b'3',
            Packet::Message(_) => b'4',
            Packet::Noop => b'6',
        }
    }

    /// Encodes this packet to its text wire representation.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.type_digit() as char);
        match self {
            Packet::Open(open) => {
                out.push_str(&serde_json::to_string(open).expect("OpenPacket always serializes"))
            }
            Packet::Message(msg) => out.push_str(msg),
            _ => {}
        }
        out
    }

    /// Decodes a text frame into a [`Packet`].
    pub fn decode(frame: &str) -> Result<Self, ParsePacketError> {
        let mut chars = frame.chars();
        let ty = chars.next().ok_or(ParsePacketError::Empty)?;
        let rest = chars.as_str();
        match ty {
            '0' => Ok(Packet::Open(
                serde_json::from_str(rest).map_err(ParsePacketError::Json)?,
            )),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping),
            '3' => Ok(Packet::Pong),
            '4' => Ok(Packet::Message(rest.to_owned())),
            '6' => Ok(Packet::Noop),
            other => Err(ParsePacketError::UnknownType(other)),
        }
    }
}

/// Error decoding an Engine.IO frame.
#[derive(Debug, Error)]
pub enum ParsePacketError {
    #[error("empty frame")]
    Empty,
    #[error("unknown engine.io packet type {0:?}")]
    UnknownType(char),
    #[error("malformed OPEN payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Payload of the `OPEN` frame, sent once right after a session is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPacket {
    pub sid: crate::sid::Sid,
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    pub max_payload: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn encodes_and_decodes_heartbeat_frames() {
        for p in [Packet::Ping, Packet::Pong, Packet::Close, Packet::Noop] {
            let encoded = p.encode();
            assert_eq!(Packet::decode(&encoded).unwrap(), p);
        }
    }

    #[test]
    fn encodes_and_decodes_message_frames() {
        let p = Packet::Message("40/chat,".into());
        assert_eq!(p.encode(), "440/chat,");
        assert_eq!(Packet::decode("440/chat,").unwrap(), p);
    }

    #[test]
    fn open_packet_round_trips() {
        let open = OpenPacket {
            sid: crate::sid::Sid::new(),
            upgrades: vec!["websocket".into()],
            ping_interval: Duration::from_secs(25).as_millis() as u64,
            ping_timeout: Duration::from_secs(20).as_millis() as u64,
            max_payload: 1_000_000,
        };
        let packet = Packet::Open(open.clone());
        let encoded = packet.encode();
        assert!(encoded.starts_with('0'));
        assert_eq!(Packet::decode(&encoded).unwrap(), Packet::Open(open));
    }

    #[test]
    fn rejects_unknown_type() {
        assert!(matches!(
            Packet::decode("9hello"),
            Err(ParsePacketError::UnknownType('9'))
        ));
    }

    #[test]
    fn rejects_empty_frame() {
        assert!(matches!(Packet::decode(""), Err(ParsePacketError::Empty)));
    }
}
