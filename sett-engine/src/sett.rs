//! Root handle: store lifecycle plus passthroughs to the root table.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sett_common::SettResult;
use tracing::info;

use crate::config::Options;
use crate::engine::Store;
use crate::expirer::{self, ExpirerHandle};
use crate::memory::MemoryStore;
use crate::redb_store::RedbStore;
use crate::table::Table;

/// An open store. Cheap to share behind an `Arc`; table handles created from
/// it hold their own reference to the store.
pub struct Sett<S: Store = RedbStore> {
    store: Arc<S>,
    options: Options,
    expirer: Option<ExpirerHandle>,
}

impl Sett<RedbStore> {
    /// Opens (or creates) the redb database described by `options`.
    ///
    /// Starts the background expirer if `options` enables it.
    pub fn open(options: Options) -> SettResult<Self> {
        let store = RedbStore::open(&options.path)?;
        let sett = Sett::with_store(store, options)?;
        info!(path = %sett.options.path.display(), "sett opened");
        Ok(sett)
    }
}

impl Sett<MemoryStore> {
    /// Creates a volatile store with default options.
    pub fn memory() -> Self {
        Sett {
            store: Arc::new(MemoryStore::new()),
            options: Options::default(),
            expirer: None,
        }
    }
}

impl<S: Store + 'static> Sett<S> {
    /// Wraps an already opened store.
    pub fn with_store(store: S, options: Options) -> SettResult<Self> {
        options.validate()?;
        let store = Arc::new(store);
        let expirer = match options.expirer_interval() {
            Some(interval) => Some(expirer::start(Arc::clone(&store), interval)?),
            None => None,
        };
        Ok(Sett {
            store,
            options,
            expirer,
        })
    }

    /// Starts (or restarts) the background expirer.
    pub fn start_expirer(&mut self, interval: Duration) -> SettResult<()> {
        self.expirer = None;
        self.expirer = Some(expirer::start(Arc::clone(&self.store), interval)?);
        Ok(())
    }

    /// Physically removes expired entries from every table.
    pub fn purge_expired(&self) -> SettResult<usize> {
        expirer::purge_all(&*self.store)
    }

    /// Stops the expirer and releases the store.
    pub fn close(mut self) {
        if let Some(handle) = self.expirer.take() {
            handle.stop();
        }
        info!("sett closed");
    }
}

impl<S: Store> Sett<S> {
    /// Returns a handle for the table `name`.
    pub fn table(&self, name: &str) -> Table<S> {
        Table::new(Arc::clone(&self.store), name)
            .with_key_length(self.options.default_key_length)
            .with_reclaim_on_read(self.options.reclaim_on_read)
    }

    /// Returns the handle for the root table.
    pub fn root(&self) -> Table<S> {
        self.table("")
    }

    /// Returns the options the store was opened with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Root-table [`Table::set_str`].
    pub fn set_str(&self, key: &str, value: &str) -> SettResult<()> {
        self.root().set_str(key, value)
    }

    /// Root-table [`Table::get_str`].
    pub fn get_str(&self, key: &str) -> SettResult<String> {
        self.root().get_str(key)
    }

    /// Root-table [`Table::set`].
    pub fn set<T>(&self, key: &str, value: &T) -> SettResult<()>
    where
        T: Serialize + ?Sized,
    {
        self.root().set(key, value)
    }

    /// Root-table [`Table::get`].
    pub fn get<T>(&self, key: &str) -> SettResult<T>
    where
        T: DeserializeOwned,
    {
        self.root().get(key)
    }

    /// Root-table [`Table::has_key`].
    pub fn has_key(&self, key: &str) -> SettResult<bool> {
        self.root().has_key(key)
    }

    /// Root-table [`Table::delete`].
    pub fn delete(&self, key: &str) -> SettResult<()> {
        self.root().delete(key)
    }

    /// Root-table [`Table::cut`].
    pub fn cut<T>(&self, key: &str) -> SettResult<T>
    where
        T: DeserializeOwned,
    {
        self.root().cut(key)
    }

    /// Root-table [`Table::insert`].
    pub fn insert<T>(&self, value: &T) -> SettResult<String>
    where
        T: Serialize + ?Sized,
    {
        self.root().insert(value)
    }

    /// Root-table [`Table::keys`].
    pub fn keys(&self, prefix: Option<&str>) -> SettResult<Vec<String>> {
        self.root().keys(prefix)
    }

    /// Root-table [`Table::with_ttl`].
    pub fn with_ttl(&self, ttl: Duration) -> Table<S> {
        self.root().with_ttl(ttl)
    }
}
