//! # Scan/Filter Engine
//!
//! ## Design Principles
//!
//! 1. **Bounded Ranges**: Every scan is bounded by the key codec's table (or
//!    table + prefix) range, so it never touches another table.
//! 2. **Expiry First**: Lapsed entries are skipped before any decoding of the
//!    payload and handed back to the caller for best-effort reclamation.
//! 3. **Fail Loudly**: A payload that does not decode aborts the scan with the
//!    error instead of silently dropping the entry.
//! 4. **Snapshot Results**: Results are collected inside one read transaction;
//!    nothing streams across calls.

use serde::de::DeserializeOwned;
use sett_common::{Envelope, KeyRange, SettResult, decode_key};
use tracing::trace;

use crate::engine::StoreRead;
use crate::value::from_envelope;

/// Matches produced by a scan plus the expired entries it stepped over.
#[derive(Debug)]
pub(crate) struct ScanOutcome<T> {
    /// Matching items in physical key order.
    pub matches: Vec<T>,
    /// Physical keys whose stamps had lapsed.
    pub expired: Vec<Vec<u8>>,
}

/// Walks `range`, calling `on_live` with the logical key and envelope of every
/// live entry. Returns the physical keys of expired entries.
pub(crate) fn scan_live<R, F>(
    read: &R,
    range: &KeyRange,
    now_ms: u64,
    mut on_live: F,
) -> SettResult<Vec<Vec<u8>>>
where
    R: StoreRead + ?Sized,
    F: FnMut(String, Envelope) -> SettResult<()>,
{
    let mut expired = Vec::new();
    read.scan(range, &mut |physical, raw| {
        let envelope = Envelope::decode(raw)?;
        if envelope.is_expired_at(now_ms) {
            trace!(key_len = physical.len(), "skipping expired entry");
            expired.push(physical.to_vec());
            return Ok(true);
        }
        let (_, key) = decode_key(physical)?;
        on_live(key, envelope)?;
        Ok(true)
    })?;
    Ok(expired)
}

/// Collects the logical keys of every live entry in `range`.
pub(crate) fn live_keys<R>(read: &R, range: &KeyRange, now_ms: u64) -> SettResult<ScanOutcome<String>>
where
    R: StoreRead + ?Sized,
{
    let mut matches = Vec::new();
    let expired = scan_live(read, range, now_ms, |key, _| {
        matches.push(key);
        Ok(())
    })?;
    Ok(ScanOutcome { matches, expired })
}

/// Decodes every live value in `range` as `T` and keeps the entries for which
/// `predicate` returns true.
pub(crate) fn filter_entries<R, T, P>(
    read: &R,
    range: &KeyRange,
    now_ms: u64,
    mut predicate: P,
) -> SettResult<ScanOutcome<(String, T)>>
where
    R: StoreRead + ?Sized,
    T: DeserializeOwned,
    P: FnMut(&str, &T) -> bool,
{
    let mut matches = Vec::new();
    let expired = scan_live(read, range, now_ms, |key, envelope| {
        let value: T = from_envelope(&envelope)?;
        if predicate(&key, &value) {
            matches.push((key, value));
        }
        Ok(())
    })?;
    Ok(ScanOutcome { matches, expired })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Store;
    use crate::memory::MemoryStore;
    use crate::value::to_json;
    use sett_common::{Encoding, ExpiryStamp, SettError, encode_key, prefix_bounds, table_bounds};

    fn seed(store: &MemoryStore, table: &str, key: &str, value: u32, expires_at: Option<u64>) {
        let envelope = Envelope::new(
            to_json(&value).unwrap(),
            Encoding::Json,
            expires_at.map(ExpiryStamp::from_millis),
        );
        store
            .update(|tx| tx.put(&encode_key(table, key), &envelope.encode()))
            .unwrap();
    }

    #[test]
    fn lists_live_keys_in_order() {
        let store = MemoryStore::new();
        seed(&store, "t", "b", 1, None);
        seed(&store, "t", "a", 2, None);
        seed(&store, "t", "c", 3, Some(5));
        seed(&store, "other", "z", 4, None);

        let outcome = store
            .view(|read| live_keys(read, &table_bounds("t"), 10))
            .unwrap();
        assert_eq!(outcome.matches, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(outcome.expired, vec![encode_key("t", "c").to_vec()]);
    }

    #[test]
    fn prefix_scan_excludes_non_matching_keys() {
        let store = MemoryStore::new();
        seed(&store, "t", "user:1", 1, None);
        seed(&store, "t", "user:2", 2, None);
        seed(&store, "t", "group:1", 3, None);

        let outcome = store
            .view(|read| live_keys(read, &prefix_bounds("t", "user:"), 0))
            .unwrap();
        assert_eq!(outcome.matches, vec!["user:1".to_string(), "user:2".to_string()]);
    }

    #[test]
    fn filter_applies_predicate_to_decoded_values() {
        let store = MemoryStore::new();
        for (key, value) in [("a", 1), ("b", 20), ("c", 30)] {
            seed(&store, "t", key, value, None);
        }

        let outcome = store
            .view(|read| filter_entries(read, &table_bounds("t"), 0, |_, v: &u32| *v >= 20))
            .unwrap();
        let keys: Vec<_> = outcome.matches.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn undecodable_value_aborts_filter() {
        let store = MemoryStore::new();
        seed(&store, "t", "a", 1, None);
        let raw = Envelope::new(&b"not json"[..], Encoding::Raw, None);
        store
            .update(|tx| tx.put(&encode_key("t", "b"), &raw.encode()))
            .unwrap();

        let err = store
            .view(|read| filter_entries(read, &table_bounds("t"), 0, |_, _: &u32| true))
            .unwrap_err();
        assert!(matches!(err, SettError::Deserialize(_)));
    }
}
