use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chatsync_core::{BlobStore, StoreError};
use chatsync_db::Store;
use parking_lot::Mutex;

/// [`BlobStore`] over the SQLite `records` table. Queries run on the
/// blocking pool so request handlers never stall a runtime worker.
#[derive(Clone)]
pub struct SqliteBlobStore {
    store: Arc<Mutex<Store>>,
}

impl SqliteBlobStore {
    pub fn open(path: impl AsRef<Path>) -> chatsync_db::Result<Self> {
        Ok(Self::from_store(Store::open(path)?))
    }

    pub fn open_in_memory() -> chatsync_db::Result<Self> {
        Ok(Self::from_store(Store::open_in_memory()?))
    }

    fn from_store(store: Store) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Store) -> chatsync_db::Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&mut store.lock()))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
            .map_err(|e| StoreError::Backend(Box::new(e)))
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn read(&self, name: &str) -> Result<Option<String>, StoreError> {
        let name = name.to_string();
        self.run(move |store| store.records().get(&name)).await
    }

    async fn write(&self, name: &str, value: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        let value = value.to_string();
        self.run(move |store| store.records().put(&name, &value))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_record_reads_as_none() {
        let blobs = SqliteBlobStore::open_in_memory().unwrap();
        assert_eq!(blobs.read("user_data").await.unwrap(), None);
    }

    #[tokio::test]
    async fn values_survive_reopening_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatsync.sqlite3");

        let blobs = SqliteBlobStore::open(&path).unwrap();
        blobs.write("admin_prompt", "").await.unwrap();
        blobs.write("user_data", "買牛奶").await.unwrap();
        drop(blobs);

        let blobs = SqliteBlobStore::open(&path).unwrap();
        assert_eq!(blobs.read("admin_prompt").await.unwrap().as_deref(), Some(""));
        assert_eq!(blobs.read("user_data").await.unwrap().as_deref(), Some("買牛奶"));
    }
}
