//! # Storage Engine Interface
//!
//! ## Design Principles
//!
//! 1. **Strategy Pattern**: Abstract the ordered store behind traits so the
//!    persistent and in-memory backends can be swapped without touching the
//!    table layer.
//! 2. **Binary-Safe API**: Keys and values are byte slices; namespacing and
//!    expiry live above this seam.
//! 3. **Zero-Cost Dispatch**: `Store` is used through generics, so transaction
//!    entry points monomorphize; only the per-call transaction is a trait object.
//! 4. **One Transaction Per Call**: Every operation runs inside exactly one
//!    `view` or `update`; `update` commits on `Ok` and rolls back on `Err`.

use sett_common::{KeyRange, SettResult};

/// Visitor invoked for each `(physical key, physical value)` during a scan.
///
/// Returning `Ok(false)` stops the scan early; returning an error aborts it.
pub type ScanVisitor<'a> = dyn FnMut(&[u8], &[u8]) -> SettResult<bool> + 'a;

/// Read operations available inside any transaction.
pub trait StoreRead {
    /// Returns the value stored under `key`, or `None` if absent.
    fn get(&self, key: &[u8]) -> SettResult<Option<Vec<u8>>>;

    /// Visits every entry in `range` in ascending key order.
    fn scan(&self, range: &KeyRange, visit: &mut ScanVisitor<'_>) -> SettResult<()>;
}

/// Write operations available inside a read-write transaction.
pub trait StoreTx: StoreRead {
    /// Inserts or replaces `key`.
    fn put(&mut self, key: &[u8], value: &[u8]) -> SettResult<()>;

    /// Removes `key`, returning the previous value if there was one.
    fn delete(&mut self, key: &[u8]) -> SettResult<Option<Vec<u8>>>;

    /// Removes every entry in `range`. Returns the number of removed entries.
    fn delete_range(&mut self, range: &KeyRange) -> SettResult<usize>;
}

/// An ordered, transactional key-value store.
pub trait Store: Send + Sync {
    /// Runs `f` inside a read-only transaction over a consistent snapshot.
    fn view<R>(&self, f: impl FnOnce(&dyn StoreRead) -> SettResult<R>) -> SettResult<R>;

    /// Runs `f` inside a read-write transaction.
    ///
    /// The transaction commits if `f` returns `Ok` and rolls back otherwise,
    /// so no partial effect of a failed call is ever observable.
    fn update<R>(&self, f: impl FnOnce(&mut dyn StoreTx) -> SettResult<R>) -> SettResult<R>;
}
