//! Persistent ordered store backed by redb.
//!
//! All Sett entries live in a single redb table of raw byte keys; tables,
//! expiry, and value encoding are layered on top by the key codec and the
//! value envelope. redb provides the ACID write transactions (single writer)
//! and MVCC read snapshots the table layer relies on.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use sett_common::{KeyRange, SettError, SettResult};
use tracing::{debug, warn};

use crate::engine::{ScanVisitor, Store, StoreRead, StoreTx};

/// The single physical table holding every encoded entry.
const ENTRIES: TableDefinition<'static, &'static [u8], &'static [u8]> =
    TableDefinition::new("sett_entries");

/// Ordered store persisted in a redb database file.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Opens or creates the database at `path`.
    ///
    /// Creates parent directories if needed and initializes the entry table on
    /// first open so read transactions never observe a missing table.
    ///
    /// # Errors
    ///
    /// Returns `SettError::Store` if the directory or database cannot be
    /// created, or the initialization transaction fails.
    pub fn open<P: AsRef<Path>>(path: P) -> SettResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                SettError::Store(format!(
                    "failed to create directory {}: {}",
                    parent.display(),
                    err
                ))
            })?;
        }

        let db = Database::create(path).map_err(|err| {
            SettError::Store(format!("failed to open {}: {}", path.display(), err))
        })?;

        let write_txn = db.begin_write().map_err(SettError::store)?;
        {
            write_txn.open_table(ENTRIES).map_err(SettError::store)?;
        }
        write_txn.commit().map_err(SettError::store)?;

        debug!(path = %path.display(), "opened redb store");
        Ok(RedbStore { db })
    }
}

impl Store for RedbStore {
    fn view<R>(&self, f: impl FnOnce(&dyn StoreRead) -> SettResult<R>) -> SettResult<R> {
        let read_txn = self.db.begin_read().map_err(SettError::store)?;
        let table = read_txn.open_table(ENTRIES).map_err(SettError::store)?;
        f(&RedbTable { table })
    }

    fn update<R>(&self, f: impl FnOnce(&mut dyn StoreTx) -> SettResult<R>) -> SettResult<R> {
        let write_txn = self.db.begin_write().map_err(SettError::store)?;
        let outcome = {
            let table = write_txn.open_table(ENTRIES).map_err(SettError::store)?;
            let mut tx = RedbTable { table };
            f(&mut tx)
        };

        match outcome {
            Ok(value) => {
                write_txn.commit().map_err(SettError::store)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = write_txn.abort() {
                    warn!(error = %abort_err, "failed to abort redb transaction");
                }
                Err(err)
            }
        }
    }
}

/// Adapter exposing a redb table (read-only or writable) through the store traits.
struct RedbTable<T> {
    table: T,
}

impl<T> StoreRead for RedbTable<T>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    fn get(&self, key: &[u8]) -> SettResult<Option<Vec<u8>>> {
        let guard = self.table.get(key).map_err(SettError::store)?;
        Ok(guard.map(|value| value.value().to_vec()))
    }

    fn scan(&self, range: &KeyRange, visit: &mut ScanVisitor<'_>) -> SettResult<()> {
        if range.low >= range.high {
            return Ok(());
        }
        let low: &[u8] = range.low.as_ref();
        let high: &[u8] = range.high.as_ref();
        for item in self.table.range(low..high).map_err(SettError::store)? {
            let (key, value) = item.map_err(SettError::store)?;
            if !visit(key.value(), value.value())? {
                break;
            }
        }
        Ok(())
    }
}

impl StoreTx for RedbTable<redb::Table<'_, &'static [u8], &'static [u8]>> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> SettResult<()> {
        self.table.insert(key, value).map_err(SettError::store)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> SettResult<Option<Vec<u8>>> {
        let previous = self.table.remove(key).map_err(SettError::store)?;
        Ok(previous.map(|value| value.value().to_vec()))
    }

    fn delete_range(&mut self, range: &KeyRange) -> SettResult<usize> {
        if range.low >= range.high {
            return Ok(0);
        }
        let low: &[u8] = range.low.as_ref();
        let high: &[u8] = range.high.as_ref();
        let mut removed = 0;
        self.table
            .retain_in(low..high, |_, _| {
                removed += 1;
                false
            })
            .map_err(SettError::store)?;
        Ok(removed)
    }
}
