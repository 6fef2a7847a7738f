//! # Key Codec
//!
//! Purpose: Map `(table, logical key)` pairs onto one flat, ordered keyspace.
//!
//! ## Design Principles
//!
//! 1. **Injective**: Distinct `(table, key)` pairs never share a physical key.
//! 2. **Contiguous Tables**: All keys of a table sort together, so a table is a
//!    single half-open range and `drop` is one bounded range delete.
//! 3. **Prefix Safe**: The table name is escaped and `0x00`-terminated, so table
//!    `"abc"` never captures keys of table `"abcdef"`.
//! 4. **Order Preserving**: Within a table, physical order equals the byte
//!    order of logical keys.
//!
//! ## Memory Layout Example
//!
//! ```text
//! Physical key:
//! +---------+------------------+------+-------------------+
//! | version | escaped(table)   | 0x00 | logical key bytes |
//! +---------+------------------+------+-------------------+
//! | 1B      | n bytes          | 1B   | m bytes           |
//! +---------+------------------+------+-------------------+
//!
//! Escaping inside the table name:
//!   0x00 -> 0x01 0x01
//!   0x01 -> 0x01 0x02
//!
//! Table "users" spans [ 01 'users' 00 , 01 'users' 01 )
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{SettError, SettResult};

/// Key format version written as the first byte of every physical key.
pub const KEY_VERSION: u8 = 0x01;

/// Terminates the escaped table name (lowest byte value).
const TERMINATOR_BYTE: u8 = 0x00;

/// Escape marker for terminator/escape bytes inside a table name.
const ESCAPE_BYTE: u8 = 0x01;

/// Half-open physical key range `[low, high)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    /// Inclusive lower bound.
    pub low: Bytes,
    /// Exclusive upper bound.
    pub high: Bytes,
}

impl KeyRange {
    /// Returns true if `key` falls inside the range.
    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.low.as_ref() && key < self.high.as_ref()
    }
}

/// Returns the physical prefix shared by every key of `table`.
pub fn table_prefix(table: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(table.len() + 2);
    buf.put_u8(KEY_VERSION);
    put_escaped(table.as_bytes(), &mut buf);
    buf.freeze()
}

/// Encodes a logical key of `table` into its physical key.
pub fn encode_key(table: &str, key: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(table.len() + key.len() + 2);
    buf.put_u8(KEY_VERSION);
    put_escaped(table.as_bytes(), &mut buf);
    buf.extend_from_slice(key.as_bytes());
    buf.freeze()
}

/// Decodes a physical key back into `(table, logical key)`.
///
/// # Errors
///
/// Returns `SettError::Codec` if the version byte is wrong, the table name is
/// unterminated or badly escaped, or either part is not valid UTF-8.
pub fn decode_key(physical: &[u8]) -> SettResult<(String, String)> {
    let Some((&version, mut rest)) = physical.split_first() else {
        return Err(SettError::Codec("empty physical key".to_string()));
    };
    if version != KEY_VERSION {
        return Err(SettError::Codec(format!(
            "invalid key version: expected 0x{:02x}, got 0x{:02x}",
            KEY_VERSION, version
        )));
    }

    let table = take_escaped(&mut rest)?;
    let table = String::from_utf8(table)
        .map_err(|_| SettError::Codec("table name is not valid UTF-8".to_string()))?;
    let key = std::str::from_utf8(rest)
        .map_err(|_| SettError::Codec("logical key is not valid UTF-8".to_string()))?;

    Ok((table, key.to_string()))
}

/// Returns the range covering exactly the entries of `table`.
pub fn table_bounds(table: &str) -> KeyRange {
    let low = table_prefix(table);
    // The prefix always ends with the terminator, so bumping it to 0x01 is
    // the tightest exclusive bound.
    let mut high = BytesMut::from(low.as_ref());
    if let Some(last) = high.last_mut() {
        *last = TERMINATOR_BYTE + 1;
    }
    KeyRange {
        low,
        high: high.freeze(),
    }
}

/// Returns the range covering every table of the current key version.
pub fn keyspace_bounds() -> KeyRange {
    KeyRange {
        low: Bytes::from_static(&[KEY_VERSION]),
        high: Bytes::from_static(&[KEY_VERSION + 1]),
    }
}

/// Returns the range of `table` entries whose logical key starts with `key_prefix`.
///
/// An empty prefix yields [`table_bounds`].
pub fn prefix_bounds(table: &str, key_prefix: &str) -> KeyRange {
    if key_prefix.is_empty() {
        return table_bounds(table);
    }
    let low = encode_key(table, key_prefix);
    let high = lex_increment(&low).unwrap_or_else(|| table_bounds(table).high);
    KeyRange { low, high }
}

/// Computes the smallest byte string strictly greater than every string
/// starting with `data`.
///
/// Returns `None` if `data` is empty or all `0xFF`.
fn lex_increment(data: &[u8]) -> Option<Bytes> {
    let mut result = BytesMut::from(data);
    while let Some(last) = result.last_mut() {
        if *last < 0xFF {
            *last += 1;
            return Some(result.freeze());
        }
        result.truncate(result.len() - 1);
    }
    None
}

fn put_escaped(data: &[u8], buf: &mut BytesMut) {
    for &byte in data {
        match byte {
            TERMINATOR_BYTE => {
                buf.put_u8(ESCAPE_BYTE);
                buf.put_u8(0x01);
            }
            ESCAPE_BYTE => {
                buf.put_u8(ESCAPE_BYTE);
                buf.put_u8(0x02);
            }
            _ => buf.put_u8(byte),
        }
    }
    buf.put_u8(TERMINATOR_BYTE);
}

fn take_escaped(buf: &mut &[u8]) -> SettResult<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < buf.len() {
        match buf[i] {
            TERMINATOR_BYTE => {
                *buf = &buf[i + 1..];
                return Ok(out);
            }
            ESCAPE_BYTE => {
                let next = buf.get(i + 1).copied().ok_or_else(|| {
                    SettError::Codec("truncated escape sequence in table name".to_string())
                })?;
                match next {
                    0x01 => out.push(TERMINATOR_BYTE),
                    0x02 => out.push(ESCAPE_BYTE),
                    other => {
                        return Err(SettError::Codec(format!(
                            "invalid escape sequence: 0x01 0x{:02x}",
                            other
                        )));
                    }
                }
                i += 2;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    Err(SettError::Codec(
        "unterminated table name (missing 0x00 terminator)".to_string(),
    ))
}
