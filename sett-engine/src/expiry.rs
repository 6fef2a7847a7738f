//! # Expiry Index
//!
//! Stamps writes with an absolute expiration instant and decides liveness on
//! every read. Nothing here caches liveness: each lookup recomputes it against
//! the current clock, so an expired entry is never returned even if it has not
//! been physically removed yet.
//!
//! Physical reclamation is a separate, best-effort write that re-checks the
//! stamp under the write lock before deleting.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sett_common::{Envelope, ExpiryStamp, KeyRange, SettResult};
use tracing::{trace, warn};

use crate::engine::{Store, StoreRead, StoreTx};

/// Result of a point lookup after the expiry check.
#[derive(Debug)]
pub(crate) enum Lookup {
    /// The entry exists and has not expired.
    Live(Envelope),
    /// The entry exists physically but its stamp has lapsed.
    Expired,
    /// No entry exists.
    Missing,
}

/// Returns the current time in Unix epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Computes the stamp for a write issued at `now_ms` with `ttl`.
///
/// A missing or zero TTL produces no stamp. Positive TTLs shorter than a
/// millisecond round up to one millisecond.
pub fn stamp_at(ttl: Option<Duration>, now_ms: u64) -> Option<ExpiryStamp> {
    let ttl = ttl.filter(|ttl| !ttl.is_zero())?;
    let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
    Some(ExpiryStamp::from_millis(now_ms.saturating_add(millis)))
}

/// Computes the stamp for a write issued now.
pub fn stamp(ttl: Option<Duration>) -> Option<ExpiryStamp> {
    stamp_at(ttl, now_millis())
}

/// Reads `physical` and classifies it against `now_ms`.
pub(crate) fn lookup<R>(read: &R, physical: &[u8], now_ms: u64) -> SettResult<Lookup>
where
    R: StoreRead + ?Sized,
{
    let Some(raw) = read.get(physical)? else {
        return Ok(Lookup::Missing);
    };
    let envelope = Envelope::decode(&raw)?;
    if envelope.is_expired_at(now_ms) {
        Ok(Lookup::Expired)
    } else {
        Ok(Lookup::Live(envelope))
    }
}

/// Deletes `physical` if it is still expired, in its own write transaction.
///
/// Returns true if an entry was removed. A concurrent write that refreshed the
/// entry in the meantime leaves it untouched.
pub(crate) fn reclaim_if_expired<S>(store: &S, physical: &[u8]) -> SettResult<bool>
where
    S: Store,
{
    store.update(|tx| {
        let now_ms = now_millis();
        match lookup(&*tx, physical, now_ms)? {
            Lookup::Expired => {
                tx.delete(physical)?;
                Ok(true)
            }
            Lookup::Live(_) | Lookup::Missing => Ok(false),
        }
    })
}

/// Best-effort variant of [`reclaim_if_expired`] for many keys; failures are
/// logged, never returned, since readers already treat the entries as absent.
pub(crate) fn reclaim_quietly<S>(store: &S, expired: &[Vec<u8>])
where
    S: Store,
{
    if expired.is_empty() {
        return;
    }
    let result = store.update(|tx| {
        let now_ms = now_millis();
        let mut removed = 0usize;
        for physical in expired {
            if let Lookup::Expired = lookup(&*tx, physical, now_ms)? {
                tx.delete(physical)?;
                removed += 1;
            }
        }
        Ok(removed)
    });
    match result {
        Ok(removed) => trace!(candidates = expired.len(), removed, "reclaimed expired entries"),
        Err(err) => warn!(error = %err, candidates = expired.len(), "failed to reclaim expired entries"),
    }
}

/// Removes every expired entry in `range` inside the caller's transaction.
///
/// Entries with malformed envelopes are skipped rather than deleted.
pub(crate) fn purge_range<T>(tx: &mut T, range: &KeyRange, now_ms: u64) -> SettResult<usize>
where
    T: StoreTx + ?Sized,
{
    let mut expired = Vec::new();
    tx.scan(range, &mut |key, value| {
        if let Ok(envelope) = Envelope::decode(value) {
            if envelope.is_expired_at(now_ms) {
                expired.push(key.to_vec());
            }
        }
        Ok(true)
    })?;
    for key in &expired {
        tx.delete(key)?;
    }
    Ok(expired.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use sett_common::{encode_key, table_bounds, Encoding};

    #[test]
    fn no_ttl_means_no_stamp() {
        assert_eq!(stamp_at(None, 1_000), None);
        assert_eq!(stamp_at(Some(Duration::ZERO), 1_000), None);
    }

    #[test]
    fn stamp_adds_ttl_to_now() {
        let stamp = stamp_at(Some(Duration::from_millis(250)), 1_000).unwrap();
        assert_eq!(stamp.as_millis(), 1_250);
    }

    #[test]
    fn sub_millisecond_ttl_rounds_up() {
        let stamp = stamp_at(Some(Duration::from_micros(10)), 1_000).unwrap();
        assert_eq!(stamp.as_millis(), 1_001);
    }

    #[test]
    fn huge_ttl_saturates() {
        let stamp = stamp_at(Some(Duration::MAX), 1_000).unwrap();
        assert_eq!(stamp.as_millis(), u64::MAX);
    }

    fn put_envelope(store: &MemoryStore, key: &str, expires_at: Option<u64>) {
        let envelope = Envelope::new(
            &b"v"[..],
            Encoding::Raw,
            expires_at.map(ExpiryStamp::from_millis),
        );
        store
            .update(|tx| tx.put(&encode_key("t", key), &envelope.encode()))
            .unwrap();
    }

    #[test]
    fn lookup_classifies_entries() {
        let store = MemoryStore::new();
        put_envelope(&store, "live", Some(2_000));
        put_envelope(&store, "dead", Some(1_000));

        store
            .view(|read| {
                assert!(matches!(lookup(read, &encode_key("t", "live"), 1_500)?, Lookup::Live(_)));
                assert!(matches!(lookup(read, &encode_key("t", "dead"), 1_500)?, Lookup::Expired));
                assert!(matches!(lookup(read, &encode_key("t", "none"), 1_500)?, Lookup::Missing));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn reclaim_leaves_live_entries() {
        let store = MemoryStore::new();
        put_envelope(&store, "dead", Some(1));
        put_envelope(&store, "forever", None);

        assert!(reclaim_if_expired(&store, &encode_key("t", "dead")).unwrap());
        assert!(!reclaim_if_expired(&store, &encode_key("t", "forever")).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn purge_range_removes_only_expired() {
        let store = MemoryStore::new();
        put_envelope(&store, "a", Some(1));
        put_envelope(&store, "b", None);
        put_envelope(&store, "c", Some(u64::MAX));

        let removed = store
            .update(|tx| purge_range(tx, &table_bounds("t"), now_millis()))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 2);
    }
}
