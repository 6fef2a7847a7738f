//! Payload encoding for the typed value layer.
//!
//! Strings and byte buffers are stored verbatim; every other value goes
//! through `serde_json`. The envelope records which of the two was used, and
//! the caller chooses the target type at read time.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sett_common::{Encoding, Envelope, SettError, SettResult};

/// Serializes `value` to JSON bytes.
pub(crate) fn to_json<T>(value: &T) -> SettResult<Bytes>
where
    T: Serialize + ?Sized,
{
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|err| SettError::Serialize(err.to_string()))
}

/// Decodes a JSON payload into `T`.
pub(crate) fn from_envelope<T>(envelope: &Envelope) -> SettResult<T>
where
    T: DeserializeOwned,
{
    match envelope.encoding {
        Encoding::Json => serde_json::from_slice(&envelope.payload)
            .map_err(|err| SettError::Deserialize(err.to_string())),
        Encoding::Raw => Err(SettError::Deserialize(
            "value was stored as raw bytes; read it with get_str or get_bytes".to_string(),
        )),
    }
}

/// Decodes a payload as a string.
///
/// Raw payloads must be UTF-8; JSON payloads must hold a JSON string.
pub(crate) fn str_from_envelope(envelope: &Envelope) -> SettResult<String> {
    match envelope.encoding {
        Encoding::Raw => String::from_utf8(envelope.payload.to_vec())
            .map_err(|err| SettError::Deserialize(err.to_string())),
        Encoding::Json => from_envelope(envelope),
    }
}
