//! # In-Memory Ordered Store
//!
//! A `BTreeMap` behind a `parking_lot::RwLock`. Readers share the lock for the
//! length of a `view`; a writer holds it exclusively for the length of an
//! `update`, which makes every transaction serializable.
//!
//! Writes are applied in place and recorded in an undo log. The log is
//! replayed when the closure fails or panics, so a transaction is
//! all-or-nothing.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;
use sett_common::{KeyRange, SettResult};

use crate::engine::{ScanVisitor, Store, StoreRead, StoreTx};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// Volatile ordered store; contents are lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<Map>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        MemoryStore {
            map: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the number of physical entries, live or expired.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Returns true if no physical entries exist.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Store for MemoryStore {
    fn view<R>(&self, f: impl FnOnce(&dyn StoreRead) -> SettResult<R>) -> SettResult<R> {
        let map = self.map.read();
        f(&MemoryRead { map: &map })
    }

    fn update<R>(&self, f: impl FnOnce(&mut dyn StoreTx) -> SettResult<R>) -> SettResult<R> {
        let mut map = self.map.write();
        let mut tx = MemoryTx {
            map: &mut map,
            undo: Vec::new(),
            committed: false,
        };
        let result = f(&mut tx);
        if result.is_ok() {
            tx.committed = true;
        }
        result
    }
}

struct MemoryRead<'a> {
    map: &'a Map,
}

impl StoreRead for MemoryRead<'_> {
    fn get(&self, key: &[u8]) -> SettResult<Option<Vec<u8>>> {
        Ok(self.map.get(key).cloned())
    }

    fn scan(&self, range: &KeyRange, visit: &mut ScanVisitor<'_>) -> SettResult<()> {
        scan_map(self.map, range, visit)
    }
}

struct MemoryTx<'a> {
    map: &'a mut Map,
    /// Previous state of every touched key, oldest first.
    undo: Vec<(Vec<u8>, Option<Vec<u8>>)>,
    committed: bool,
}

impl StoreRead for MemoryTx<'_> {
    fn get(&self, key: &[u8]) -> SettResult<Option<Vec<u8>>> {
        Ok(self.map.get(key).cloned())
    }

    fn scan(&self, range: &KeyRange, visit: &mut ScanVisitor<'_>) -> SettResult<()> {
        scan_map(&*self.map, range, visit)
    }
}

impl StoreTx for MemoryTx<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> SettResult<()> {
        let previous = self.map.insert(key.to_vec(), value.to_vec());
        self.undo.push((key.to_vec(), previous));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> SettResult<Option<Vec<u8>>> {
        let previous = self.map.remove(key);
        if let Some(value) = &previous {
            self.undo.push((key.to_vec(), Some(value.clone())));
        }
        Ok(previous)
    }

    fn delete_range(&mut self, range: &KeyRange) -> SettResult<usize> {
        if range.low >= range.high {
            return Ok(0);
        }
        let keys: Vec<Vec<u8>> = self
            .map
            .range::<[u8], _>(bounds(range))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            if let Some(previous) = self.map.remove(key.as_slice()) {
                self.undo.push((key.clone(), Some(previous)));
            }
        }
        Ok(keys.len())
    }
}

impl Drop for MemoryTx<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        while let Some((key, previous)) = self.undo.pop() {
            match previous {
                Some(value) => {
                    self.map.insert(key, value);
                }
                None => {
                    self.map.remove(&key);
                }
            }
        }
    }
}

fn bounds(range: &KeyRange) -> (Bound<&[u8]>, Bound<&[u8]>) {
    (
        Bound::Included(range.low.as_ref()),
        Bound::Excluded(range.high.as_ref()),
    )
}

fn scan_map(map: &Map, range: &KeyRange, visit: &mut ScanVisitor<'_>) -> SettResult<()> {
    if range.low >= range.high {
        return Ok(());
    }
    for (key, value) in map.range::<[u8], _>(bounds(range)) {
        if !visit(key, value)? {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use sett_common::SettError;

    fn range(low: &'static [u8], high: &'static [u8]) -> KeyRange {
        KeyRange {
            low: Bytes::from_static(low),
            high: Bytes::from_static(high),
        }
    }

    #[test]
    fn commits_on_ok() {
        let store = MemoryStore::new();
        store.update(|tx| tx.put(b"a", b"1")).unwrap();
        let value = store.view(|read| read.get(b"a")).unwrap();
        assert_eq!(value.as_deref(), Some(&b"1"[..]));
    }

    #[test]
    fn rolls_back_on_err() {
        let store = MemoryStore::new();
        store.update(|tx| tx.put(b"a", b"1")).unwrap();

        let result: SettResult<()> = store.update(|tx| {
            tx.put(b"a", b"2")?;
            tx.put(b"b", b"3")?;
            tx.delete_range(&range(b"a", b"c"))?;
            Err(SettError::NotFound)
        });
        assert!(result.is_err());

        assert_eq!(store.len(), 1);
        let value = store.view(|read| read.get(b"a")).unwrap();
        assert_eq!(value.as_deref(), Some(&b"1"[..]));
    }

    #[test]
    fn scans_half_open_range_in_order() {
        let store = MemoryStore::new();
        store
            .update(|tx| {
                for key in ["b", "a", "c", "d"] {
                    tx.put(key.as_bytes(), b"v")?;
                }
                Ok(())
            })
            .unwrap();

        let mut seen = Vec::new();
        store
            .view(|read| {
                read.scan(&range(b"a", b"d"), &mut |key, _| {
                    seen.push(key.to_vec());
                    Ok(true)
                })
            })
            .unwrap();
        assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn delete_range_reports_count() {
        let store = MemoryStore::new();
        let removed = store
            .update(|tx| {
                tx.put(b"a1", b"v")?;
                tx.put(b"a2", b"v")?;
                tx.put(b"b1", b"v")?;
                tx.delete_range(&range(b"a", b"b"))
            })
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1);
    }
}
