//! Session id generation.
//!
//! A [`Sid`] identifies one Engine.IO transport session for its whole
//! lifetime. It is also reused by `socketioxide` as the basis for socket ids
//! (allocated independently, see the `socketioxide::socket` module), so the
//! entropy/format requirements live here once.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Alphabet used by the reference Engine.IO/Socket.IO implementations for
/// base64-url-safe session ids (`A-Za-z0-9_-`).
const ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// A 20-character, URL-safe random identifier.
///
/// 20 chars over a 64-symbol alphabet gives 120 bits of entropy, comfortably
/// above the "≥ 20 chars of entropy" requirement used for session and socket
/// ids throughout the protocol. The fixed length also doubles as the
/// selector heuristic: anywhere a room is expected, a 20-character string is
/// reinterpreted as a socket id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Sid([u8; Sid::LEN]);

impl Sid {
    /// Fixed length of a [`Sid`] in bytes/chars.
    pub const LEN: usize = 20;

    /// Generates a new random [`Sid`].
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let mut buf = [0u8; Self::LEN];
        for b in buf.iter_mut() {
            *b = ALPHABET[rng.gen_range(0..ALPHABET.len())];
        }
        Self(buf)
    }

    /// Returns the string representation of this id.
    pub fn as_str(&self) -> &str {
        // SAFETY: `buf` is only ever filled from `ALPHABET`, which is ASCII.
        std::str::from_utf8(&self.0).expect("Sid bytes are always ASCII")
    }
}

impl Default for Sid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string cannot be parsed as a [`Sid`].
#[derive(Debug, thiserror::Error)]
#[error("invalid session id: expected {expected} ascii characters, got {actual}", expected = Sid::LEN)]
pub struct ParseSidError {
    actual: usize,
}

impl std::str::FromStr for Sid {
    type Err = ParseSidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::LEN || !s.is_ascii() {
            return Err(ParseSidError { actual: s.len() });
        }
        let mut buf = [0u8; Self::LEN];
        buf.copy_from_slice(s.as_bytes());
        Ok(Self(buf))
    }
}

impl TryFrom<String> for Sid {
    type Error = ParseSidError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Sid> for String {
    fn from(sid: Sid) -> Self {
        sid.as_str().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_unique_full_length_ids() {
        let a = Sid::new();
        let b = Sid::new();
        assert_eq!(a.as_str().len(), Sid::LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn round_trips_through_string() {
        let sid = Sid::new();
        let s = sid.to_string();
        let parsed: Sid = s.parse().unwrap();
        assert_eq!(sid, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("too-short".parse::<Sid>().is_err());
    }
}
