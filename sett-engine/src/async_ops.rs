//! Async wrappers for [`Table`] and [`Sett`] operations.
//!
//! Every store call is blocking. These methods move the work onto tokio's
//! blocking pool so async callers do not stall the runtime.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sett_common::{SettError, SettResult};

use crate::engine::Store;
use crate::expirer;
use crate::sett::Sett;
use crate::table::Table;

async fn blocking<R, F>(f: F) -> SettResult<R>
where
    F: FnOnce() -> SettResult<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| SettError::Internal(format!("blocking task failed: {err}")))?
}

impl<S: Store + 'static> Table<S> {
    /// Async version of [`get`](Self::get).
    pub async fn get_async<T>(&self, key: String) -> SettResult<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let table = self.clone();
        blocking(move || table.get(&key)).await
    }

    /// Async version of [`get_str`](Self::get_str).
    pub async fn get_str_async(&self, key: String) -> SettResult<String> {
        let table = self.clone();
        blocking(move || table.get_str(&key)).await
    }

    /// Async version of [`set`](Self::set).
    pub async fn set_async<T>(&self, key: String, value: T) -> SettResult<()>
    where
        T: Serialize + Send + 'static,
    {
        let table = self.clone();
        blocking(move || table.set(&key, &value)).await
    }

    /// Async version of [`set_str`](Self::set_str).
    pub async fn set_str_async(&self, key: String, value: String) -> SettResult<()> {
        let table = self.clone();
        blocking(move || table.set_str(&key, &value)).await
    }

    /// Async version of [`insert`](Self::insert).
    pub async fn insert_async<T>(&self, value: T) -> SettResult<String>
    where
        T: Serialize + Send + 'static,
    {
        let table = self.clone();
        blocking(move || table.insert(&value)).await
    }

    /// Async version of [`insert_str`](Self::insert_str).
    pub async fn insert_str_async(&self, value: String) -> SettResult<String> {
        let table = self.clone();
        blocking(move || table.insert_str(&value)).await
    }

    /// Async version of [`cut`](Self::cut).
    pub async fn cut_async<T>(&self, key: String) -> SettResult<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let table = self.clone();
        blocking(move || table.cut(&key)).await
    }

    /// Async version of [`cut_str`](Self::cut_str).
    pub async fn cut_str_async(&self, key: String) -> SettResult<String> {
        let table = self.clone();
        blocking(move || table.cut_str(&key)).await
    }

    /// Async version of [`delete`](Self::delete).
    pub async fn delete_async(&self, key: String) -> SettResult<()> {
        let table = self.clone();
        blocking(move || table.delete(&key)).await
    }

    /// Async version of [`keys`](Self::keys).
    pub async fn keys_async(&self, prefix: Option<String>) -> SettResult<Vec<String>> {
        let table = self.clone();
        blocking(move || table.keys(prefix.as_deref())).await
    }

    /// Async version of [`drop`](Self::drop).
    pub async fn drop_async(&self) -> SettResult<usize> {
        let table = self.clone();
        blocking(move || table.drop()).await
    }

    /// Async version of [`purge_expired`](Self::purge_expired).
    pub async fn purge_expired_async(&self) -> SettResult<usize> {
        let table = self.clone();
        blocking(move || table.purge_expired()).await
    }
}

impl<S: Store + 'static> Sett<S> {
    /// Async version of [`purge_expired`](Self::purge_expired).
    pub async fn purge_expired_async(&self) -> SettResult<usize> {
        let store = Arc::clone(self.store());
        blocking(move || expirer::purge_all(&*store)).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::memory::MemoryStore;

    fn table() -> Table<MemoryStore> {
        Table::new(Arc::new(MemoryStore::new()), "async")
    }

    #[tokio::test]
    async fn set_and_get_async() {
        let t = table();
        t.set_str_async("k".into(), "v".into()).await.unwrap();
        assert_eq!(t.get_str_async("k".into()).await.unwrap(), "v");

        t.set_async("n".into(), 42u32).await.unwrap();
        assert_eq!(t.get_async::<u32>("n".into()).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn insert_then_cut_async() {
        let t = table();
        let key = t.insert_str_async("payload".into()).await.unwrap();
        assert_eq!(t.cut_str_async(key.clone()).await.unwrap(), "payload");
        assert_eq!(
            t.get_str_async(key).await.unwrap_err(),
            SettError::NotFound
        );
    }

    #[tokio::test]
    async fn keys_and_drop_async() {
        let t = table();
        t.set_str_async("a".into(), "1".into()).await.unwrap();
        t.set_str_async("b".into(), "2".into()).await.unwrap();
        assert_eq!(t.keys_async(None).await.unwrap().len(), 2);

        assert_eq!(t.drop_async().await.unwrap(), 2);
        assert!(t.keys_async(None).await.unwrap().is_empty());
        t.delete_async("a".into()).await.unwrap();
    }

    #[tokio::test]
    async fn purge_expired_async_spans_tables() {
        let sett = Sett::memory();
        for name in ["a", "b"] {
            let table = sett.table(name);
            table
                .with_ttl(Duration::from_millis(1))
                .set_str_async("gone".into(), "v".into())
                .await
                .unwrap();
            table.set_str_async("kept".into(), "v".into()).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(sett.purge_expired_async().await.unwrap(), 2);
        assert_eq!(sett.store().len(), 2);
    }
}
