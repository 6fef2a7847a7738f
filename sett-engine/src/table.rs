//! # Table Handle
//!
//! ## Design Principles
//!
//! 1. **Immutable Values**: A handle is a table name plus write defaults
//!    (TTL, generated key length). `with_ttl` and `with_key_length` return new
//!    handles; nothing is shared mutably between differently configured
//!    handles over the same table.
//! 2. **One Transaction Per Call**: Every public operation runs inside exactly
//!    one store transaction; multi-step operations (`cut`, `insert`, `drop`)
//!    are all-or-nothing.
//! 3. **Absence Is Absence**: Expired entries behave exactly like missing ones.
//! 4. **Typed At The Edge**: Values are opaque bytes in the store; the caller
//!    picks the type at read time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sett_common::{
    Encoding, Envelope, SettError, SettResult, encode_key, prefix_bounds, table_bounds,
};
use tracing::{debug, warn};

use crate::engine::Store;
use crate::expiry::{self, Lookup};
use crate::keygen::{self, DEFAULT_KEY_LENGTH};
use crate::scan::{self, ScanOutcome};
use crate::value::{from_envelope, str_from_envelope, to_json};

/// Handle to one logical table.
///
/// The root table is the handle with an empty name.
pub struct Table<S: Store> {
    store: Arc<S>,
    name: Arc<str>,
    ttl: Option<Duration>,
    key_length: usize,
    reclaim_on_read: bool,
}

impl<S: Store> Clone for Table<S> {
    fn clone(&self) -> Self {
        Table {
            store: Arc::clone(&self.store),
            name: Arc::clone(&self.name),
            ttl: self.ttl,
            key_length: self.key_length,
            reclaim_on_read: self.reclaim_on_read,
        }
    }
}

impl<S: Store> fmt::Debug for Table<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("key_length", &self.key_length)
            .finish()
    }
}

impl<S: Store> Table<S> {
    /// Creates a handle for `name` over `store` with no TTL and the default
    /// key length.
    pub fn new(store: Arc<S>, name: impl Into<Arc<str>>) -> Self {
        Table {
            store,
            name: name.into(),
            ttl: None,
            key_length: DEFAULT_KEY_LENGTH,
            reclaim_on_read: true,
        }
    }

    /// Returns the table name (empty for the root table).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the TTL applied to writes through this handle.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns the length of keys generated by [`insert`](Self::insert).
    pub fn key_length(&self) -> usize {
        self.key_length
    }

    /// Returns a handle whose writes expire `ttl` after they are made.
    ///
    /// A zero duration disables expiry for writes through the new handle.
    pub fn with_ttl(&self, ttl: Duration) -> Self {
        Table {
            ttl: (!ttl.is_zero()).then_some(ttl),
            ..self.clone()
        }
    }

    /// Returns a handle whose `insert` generates keys of `length` characters.
    pub fn with_key_length(&self, length: usize) -> Self {
        Table {
            key_length: length,
            ..self.clone()
        }
    }

    pub(crate) fn with_reclaim_on_read(mut self, enabled: bool) -> Self {
        self.reclaim_on_read = enabled;
        self
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Stores a string under `key`, replacing any previous value.
    pub fn set_str(&self, key: &str, value: &str) -> SettResult<()> {
        self.put(key, Bytes::copy_from_slice(value.as_bytes()), Encoding::Raw)
    }

    /// Stores raw bytes under `key`, replacing any previous value.
    pub fn set_bytes(&self, key: &str, value: &[u8]) -> SettResult<()> {
        self.put(key, Bytes::copy_from_slice(value), Encoding::Raw)
    }

    /// Serializes `value` and stores it under `key`, replacing any previous value.
    pub fn set<T>(&self, key: &str, value: &T) -> SettResult<()>
    where
        T: Serialize + ?Sized,
    {
        self.put(key, to_json(value)?, Encoding::Json)
    }

    /// Serializes `value` and stores it under a freshly generated key.
    ///
    /// # Errors
    ///
    /// Returns `SettError::KeyspaceExhausted` if every candidate collided with
    /// a live entry, and `SettError::InvalidInput` for a zero key length.
    pub fn insert<T>(&self, value: &T) -> SettResult<String>
    where
        T: Serialize + ?Sized,
    {
        self.insert_envelope(to_json(value)?, Encoding::Json)
    }

    /// Stores a string under a freshly generated key.
    pub fn insert_str(&self, value: &str) -> SettResult<String> {
        self.insert_envelope(Bytes::copy_from_slice(value.as_bytes()), Encoding::Raw)
    }

    /// Removes `key`. Removing an absent key is not an error.
    pub fn delete(&self, key: &str) -> SettResult<()> {
        let physical = encode_key(&self.name, key);
        let existed = self.store.update(|tx| Ok(tx.delete(&physical)?.is_some()))?;
        debug!(table = %self.name, key, existed, "delete");
        Ok(())
    }

    /// Removes every entry of the table in one range delete.
    ///
    /// Returns the number of physical entries removed, including expired ones.
    pub fn drop(&self) -> SettResult<usize> {
        let bounds = table_bounds(&self.name);
        let removed = self.store.update(|tx| tx.delete_range(&bounds))?;
        debug!(table = %self.name, removed, "drop");
        Ok(removed)
    }

    /// Physically removes the table's expired entries.
    pub fn purge_expired(&self) -> SettResult<usize> {
        let bounds = table_bounds(&self.name);
        let removed = self
            .store
            .update(|tx| expiry::purge_range(tx, &bounds, expiry::now_millis()))?;
        debug!(table = %self.name, removed, "purge expired");
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Returns the string stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `SettError::NotFound` if the key is absent or expired, and
    /// `SettError::Deserialize` if the value is not a string.
    pub fn get_str(&self, key: &str) -> SettResult<String> {
        str_from_envelope(&self.fetch(key)?)
    }

    /// Returns the raw payload stored under `key`.
    pub fn get_bytes(&self, key: &str) -> SettResult<Vec<u8>> {
        Ok(self.fetch(key)?.payload.to_vec())
    }

    /// Returns the value stored under `key`, decoded as `T`.
    ///
    /// Use `serde_json::Value` as `T` to read tables holding mixed types.
    ///
    /// # Errors
    ///
    /// Returns `SettError::NotFound` if the key is absent or expired, and
    /// `SettError::Deserialize` if the value does not decode as `T`.
    pub fn get<T>(&self, key: &str) -> SettResult<T>
    where
        T: DeserializeOwned,
    {
        from_envelope(&self.fetch(key)?)
    }

    /// Returns true if `key` holds a live entry.
    pub fn has_key(&self, key: &str) -> SettResult<bool> {
        match self.fetch(key) {
            Ok(_) => Ok(true),
            Err(SettError::NotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Atomically reads and removes `key`, decoding the value as `T`.
    ///
    /// If the value does not decode, nothing is removed.
    pub fn cut<T>(&self, key: &str) -> SettResult<T>
    where
        T: DeserializeOwned,
    {
        self.take(key, |envelope| from_envelope(envelope))
    }

    /// Atomically reads and removes the string stored under `key`.
    pub fn cut_str(&self, key: &str) -> SettResult<String> {
        self.take(key, str_from_envelope)
    }

    /// Atomically reads and removes the raw payload stored under `key`.
    pub fn cut_bytes(&self, key: &str) -> SettResult<Vec<u8>> {
        self.take(key, |envelope| Ok(envelope.payload.to_vec()))
    }

    /// Lists live keys in ascending order, optionally only those starting with
    /// `prefix`.
    pub fn keys(&self, prefix: Option<&str>) -> SettResult<Vec<String>> {
        let range = prefix_bounds(&self.name, prefix.unwrap_or(""));
        let now_ms = expiry::now_millis();
        let outcome = self
            .store
            .view(|read| scan::live_keys(read, &range, now_ms))?;
        Ok(self.finish_scan(outcome))
    }

    /// Decodes every live value as `T` and returns the keys for which
    /// `predicate` holds, in ascending key order.
    ///
    /// # Errors
    ///
    /// Returns `SettError::Deserialize` (aborting the scan) if any live value
    /// does not decode as `T`.
    pub fn filter<T, P>(&self, predicate: P) -> SettResult<Vec<String>>
    where
        T: DeserializeOwned,
        P: FnMut(&str, &T) -> bool,
    {
        Ok(self
            .filter_entries(predicate)?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    /// Like [`filter`](Self::filter), but also returns the decoded values.
    pub fn filter_entries<T, P>(&self, predicate: P) -> SettResult<Vec<(String, T)>>
    where
        T: DeserializeOwned,
        P: FnMut(&str, &T) -> bool,
    {
        let range = table_bounds(&self.name);
        let now_ms = expiry::now_millis();
        let outcome = self
            .store
            .view(|read| scan::filter_entries(read, &range, now_ms, predicate))?;
        Ok(self.finish_scan(outcome))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn put(&self, key: &str, payload: Bytes, encoding: Encoding) -> SettResult<()> {
        let physical = encode_key(&self.name, key);
        let envelope = Envelope::new(payload, encoding, expiry::stamp(self.ttl));
        let encoded = envelope.encode();
        self.store.update(|tx| tx.put(&physical, &encoded))?;
        debug!(table = %self.name, key, ttl = ?self.ttl, "set");
        Ok(())
    }

    fn insert_envelope(&self, payload: Bytes, encoding: Encoding) -> SettResult<String> {
        if self.key_length == 0 {
            return Err(SettError::InvalidInput(
                "generated key length must be greater than zero".to_string(),
            ));
        }
        let now_ms = expiry::now_millis();
        let envelope = Envelope::new(payload, encoding, expiry::stamp_at(self.ttl, now_ms));
        let length = self.key_length;
        let key = self.store.update(|tx| {
            keygen::insert_with(tx, &self.name, &envelope, now_ms, || keygen::generate(length))
        })?;
        debug!(table = %self.name, key = %key, ttl = ?self.ttl, "insert");
        Ok(key)
    }

    fn fetch(&self, key: &str) -> SettResult<Envelope> {
        let physical = encode_key(&self.name, key);
        let now_ms = expiry::now_millis();
        match self.store.view(|read| expiry::lookup(read, &physical, now_ms))? {
            Lookup::Live(envelope) => Ok(envelope),
            Lookup::Missing => Err(SettError::NotFound),
            Lookup::Expired => {
                if self.reclaim_on_read {
                    if let Err(err) = expiry::reclaim_if_expired(&*self.store, &physical) {
                        warn!(table = %self.name, key, error = %err, "failed to reclaim expired entry");
                    }
                }
                Err(SettError::NotFound)
            }
        }
    }

    fn take<T>(
        &self,
        key: &str,
        decode: impl FnOnce(&Envelope) -> SettResult<T>,
    ) -> SettResult<T> {
        let physical = encode_key(&self.name, key);
        let taken = self.store.update(|tx| {
            let Some(raw) = tx.delete(&physical)? else {
                return Ok(None);
            };
            let envelope = Envelope::decode(&raw)?;
            if envelope.is_expired_at(expiry::now_millis()) {
                // Already invisible; committing the delete reclaims it.
                return Ok(None);
            }
            decode(&envelope).map(Some)
        })?;
        debug!(table = %self.name, key, found = taken.is_some(), "cut");
        taken.ok_or(SettError::NotFound)
    }

    fn finish_scan<T>(&self, outcome: ScanOutcome<T>) -> Vec<T> {
        if self.reclaim_on_read {
            expiry::reclaim_quietly(&*self.store, &outcome.expired);
        }
        outcome.matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        color: String,
        name: String,
    }

    fn table(name: &str) -> Table<MemoryStore> {
        Table::new(Arc::new(MemoryStore::new()), name)
    }

    #[test]
    fn builders_do_not_mutate_receiver() {
        let base = table("t");
        let ttl = base.with_ttl(Duration::from_secs(5));
        let short = ttl.with_key_length(4);

        assert_eq!(base.ttl(), None);
        assert_eq!(base.key_length(), DEFAULT_KEY_LENGTH);
        assert_eq!(ttl.ttl(), Some(Duration::from_secs(5)));
        assert_eq!(short.key_length(), 4);
        assert_eq!(short.ttl(), Some(Duration::from_secs(5)));
        assert_eq!(short.with_ttl(Duration::ZERO).ttl(), None);
    }

    #[test]
    fn cut_with_wrong_type_keeps_entry() {
        let t = table("t");
        t.set_str("k", "plain").unwrap();

        let err = t.cut::<Item>("k").unwrap_err();
        assert!(matches!(err, SettError::Deserialize(_)));
        assert_eq!(t.get_str("k").unwrap(), "plain");
    }

    #[test]
    fn cut_missing_key_is_not_found() {
        assert_eq!(table("t").cut_str("nope").unwrap_err(), SettError::NotFound);
    }

    #[test]
    fn expired_cut_is_not_found_and_reclaims() {
        let store = Arc::new(MemoryStore::new());
        let t = Table::new(Arc::clone(&store), "t");
        t.with_ttl(Duration::from_millis(1)).set_str("k", "v").unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(t.cut_str("k").unwrap_err(), SettError::NotFound);
        assert!(store.is_empty());
    }

    #[test]
    fn expired_get_reclaims_when_enabled() {
        let store = Arc::new(MemoryStore::new());
        let t = Table::new(Arc::clone(&store), "t").with_ttl(Duration::from_millis(1));
        t.set_str("k", "v").unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(t.get_str("k").unwrap_err(), SettError::NotFound);
        assert!(store.is_empty());
    }

    #[test]
    fn expired_get_leaves_entry_when_reclaim_disabled() {
        let store = Arc::new(MemoryStore::new());
        let t = Table::new(Arc::clone(&store), "t")
            .with_ttl(Duration::from_millis(1))
            .with_reclaim_on_read(false);
        t.set_str("k", "v").unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert!(!t.has_key("k").unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(t.purge_expired().unwrap(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn zero_key_length_is_rejected() {
        let err = table("t").with_key_length(0).insert_str("v").unwrap_err();
        assert!(matches!(err, SettError::InvalidInput(_)));
    }

    #[test]
    fn filter_entries_returns_values() {
        let t = table("items");
        let red = Item {
            color: "red".into(),
            name: "apple".into(),
        };
        t.insert(&red).unwrap();
        t.insert(&Item {
            color: "green".into(),
            name: "pear".into(),
        })
        .unwrap();

        let found = t.filter_entries(|_, item: &Item| item.color == "red").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, red);
    }
}
