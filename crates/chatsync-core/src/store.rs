use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StoreError;

/// Logical name of the directive ("admin prompt") record.
pub const DIRECTIVE_RECORD: &str = "admin_prompt";
/// Logical name of the shared user data record.
pub const USER_DATA_RECORD: &str = "user_data";

/// Durable whole-value text records addressed by logical name.
///
/// `read` distinguishes "never written" (`Ok(None)`) from a failed read
/// (`Err`); the document store seeds defaults only in the first case.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn read(&self, name: &str) -> Result<Option<String>, StoreError>;
    async fn write(&self, name: &str, value: &str) -> Result<(), StoreError>;
}

/// Process-local [`BlobStore`]. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    records: Mutex<HashMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records<K, V>(records: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            records: Mutex::new(
                records
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Synchronous peek, for assertions and diagnostics.
    pub fn get(&self, name: &str) -> Option<String> {
        self.records.lock().get(name).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get(name))
    }

    async fn write(&self, name: &str, value: &str) -> Result<(), StoreError> {
        self.records
            .lock()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}
