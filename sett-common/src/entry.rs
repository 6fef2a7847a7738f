//! # Value Envelope
//!
//! Purpose: Carry the expiry stamp and payload encoding next to the payload.
//!
//! ## Memory Layout Example
//!
//! ```text
//! +---------+-------+---------------------+---------+
//! | version | flags | expires_at (BE, ms) | payload |
//! +---------+-------+---------------------+---------+
//! | 1B      | 1B    | 8B, if FLAG_EXPIRES | rest    |
//! +---------+-------+---------------------+---------+
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{SettError, SettResult};

/// Envelope format version.
pub const ENVELOPE_VERSION: u8 = 0x01;

/// Flag bit: an expiry stamp follows the flags byte.
const FLAG_EXPIRES: u8 = 0b0000_0001;

/// Flag bit: the payload is JSON produced by `serde_json`.
const FLAG_JSON: u8 = 0b0000_0010;

/// Absolute expiration instant in Unix epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExpiryStamp(u64);

impl ExpiryStamp {
    /// Builds a stamp from Unix epoch milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        ExpiryStamp(millis)
    }

    /// Returns the stamp as Unix epoch milliseconds.
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns true once `now_ms` has reached the stamp.
    pub const fn is_expired_at(self, now_ms: u64) -> bool {
        self.0 <= now_ms
    }
}

/// How the payload bytes were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Caller-supplied bytes or UTF-8 string, stored verbatim.
    Raw,
    /// A `serde` value serialized as JSON.
    Json,
}

/// Decoded physical value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Optional expiry stamp; `None` never expires.
    pub expires_at: Option<ExpiryStamp>,
    /// Payload encoding.
    pub encoding: Encoding,
    /// Payload bytes.
    pub payload: Bytes,
}

impl Envelope {
    /// Builds an envelope around `payload`.
    pub fn new(payload: impl Into<Bytes>, encoding: Encoding, expires_at: Option<ExpiryStamp>) -> Self {
        Envelope {
            expires_at,
            encoding,
            payload: payload.into(),
        }
    }

    /// Returns true if the envelope carries a stamp that has lapsed at `now_ms`.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expires_at.is_some_and(|stamp| stamp.is_expired_at(now_ms))
    }

    /// Serializes the envelope into its physical form.
    pub fn encode(&self) -> Bytes {
        let mut flags = 0;
        if self.expires_at.is_some() {
            flags |= FLAG_EXPIRES;
        }
        if self.encoding == Encoding::Json {
            flags |= FLAG_JSON;
        }

        let mut buf = BytesMut::with_capacity(10 + self.payload.len());
        buf.put_u8(ENVELOPE_VERSION);
        buf.put_u8(flags);
        if let Some(stamp) = self.expires_at {
            buf.put_u64(stamp.as_millis());
        }
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// Parses a physical value.
    ///
    /// # Errors
    ///
    /// Returns `SettError::Codec` on a version mismatch, unknown flag bits,
    /// or a truncated header.
    pub fn decode(data: &[u8]) -> SettResult<Self> {
        let mut buf = data;
        if buf.remaining() < 2 {
            return Err(SettError::Codec(format!(
                "envelope too short: expected at least 2 bytes, got {}",
                buf.remaining()
            )));
        }
        let version = buf.get_u8();
        if version != ENVELOPE_VERSION {
            return Err(SettError::Codec(format!(
                "invalid envelope version: expected 0x{:02x}, got 0x{:02x}",
                ENVELOPE_VERSION, version
            )));
        }
        let flags = buf.get_u8();
        if flags & !(FLAG_EXPIRES | FLAG_JSON) != 0 {
            return Err(SettError::Codec(format!("unknown envelope flags 0x{:02x}", flags)));
        }

        let expires_at = if flags & FLAG_EXPIRES != 0 {
            if buf.remaining() < 8 {
                return Err(SettError::Codec("truncated expiry stamp".to_string()));
            }
            Some(ExpiryStamp::from_millis(buf.get_u64()))
        } else {
            None
        };
        let encoding = if flags & FLAG_JSON != 0 {
            Encoding::Json
        } else {
            Encoding::Raw
        };

        Ok(Envelope {
            expires_at,
            encoding,
            payload: Bytes::copy_from_slice(buf),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_expires_at_boundary() {
        let stamp = ExpiryStamp::from_millis(1_000);
        assert!(!stamp.is_expired_at(999));
        assert!(stamp.is_expired_at(1_000));
        assert!(stamp.is_expired_at(1_001));
    }

    #[test]
    fn permanent_envelope_never_expires() {
        let envelope = Envelope::new(&b"v"[..], Encoding::Raw, None);
        assert!(!envelope.is_expired_at(u64::MAX));
        assert_eq!(envelope.encode().as_ref(), b"\x01\x00v");
    }

    #[test]
    fn stamped_json_envelope_layout() {
        let envelope = Envelope::new(
            &b"{}"[..],
            Encoding::Json,
            Some(ExpiryStamp::from_millis(0x0102)),
        );
        let encoded = envelope.encode();
        assert_eq!(encoded.len(), 2 + 8 + 2);
        assert_eq!(encoded[1], FLAG_EXPIRES | FLAG_JSON);
        assert_eq!(&encoded[8..10], &[0x01, 0x02]);
        assert_eq!(Envelope::decode(&encoded).unwrap(), envelope);
    }

    #[test]
    fn rejects_short_and_foreign_values() {
        assert!(Envelope::decode(b"\x01").is_err());
        assert!(Envelope::decode(b"\x09\x00").is_err());
        assert!(Envelope::decode(b"\x01\x80").is_err());
        assert!(Envelope::decode(b"\x01\x01\x00\x00").is_err());
    }
}
