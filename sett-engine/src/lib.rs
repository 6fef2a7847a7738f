// sett-engine - Tables, TTL expiry and typed values over an ordered KV store
//
// Storage backends implement the `Store` traits; everything above them
// (tables, envelopes, key generation, scans) is backend agnostic.

pub mod async_ops;
pub mod config;
pub mod engine;
pub mod expirer;
mod expiry;
pub mod keygen;
pub mod memory;
pub mod redb_store;
mod scan;
pub mod sett;
pub mod table;
mod value;

pub use config::Options;
pub use engine::{ScanVisitor, Store, StoreRead, StoreTx};
pub use expirer::ExpirerHandle;
pub use expiry::{now_millis, stamp};
pub use keygen::{DEFAULT_KEY_LENGTH, MAX_INSERT_ATTEMPTS};
pub use memory::MemoryStore;
pub use redb_store::RedbStore;
pub use sett::Sett;
pub use table::Table;

pub use sett_common::{SettError, SettErrorCategory, SettResult};
