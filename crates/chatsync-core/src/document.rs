//! The two process-wide text documents: the directive ("admin prompt") and
//! the shared user data every chat session reads and writes.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::bus::NotificationBus;
use crate::event::ServerEvent;
use crate::store::{BlobStore, DIRECTIVE_RECORD, USER_DATA_RECORD};

pub const DEFAULT_DIRECTIVE: &str = "你是一個友善且專業的 AI 助理。請用繁體中文回答問題，態度親切，盡力協助使用者解決問題。";

pub const DEFAULT_USER_DATA: &str = r#"{
  "牛奶": "2瓶",
  "雞蛋": "12顆",
  "蘋果": "6個",
  "香蕉": "4根",
  "蘿蔔": "5根",
  "黃瓜": "2條"
}"#;

/// In-memory copies of both documents, mirrored to a [`BlobStore`].
///
/// Reads never wait. Writers are serialized by `write_lock`, which is also
/// held while a user data change is broadcast, so subscribers observe
/// updates in the order they were applied.
pub struct DocumentStore {
    blobs: Arc<dyn BlobStore>,
    bus: NotificationBus,
    directive: RwLock<String>,
    user_data: RwLock<String>,
    write_lock: Mutex<()>,
}

impl DocumentStore {
    /// Start from the built-in defaults; call [`load_on_startup`](Self::load_on_startup)
    /// to pick up durable values.
    pub fn new(blobs: Arc<dyn BlobStore>, bus: NotificationBus) -> Self {
        Self {
            blobs,
            bus,
            directive: RwLock::new(DEFAULT_DIRECTIVE.to_string()),
            user_data: RwLock::new(DEFAULT_USER_DATA.to_string()),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn load_on_startup(&self) {
        let _guard = self.write_lock.lock().await;
        self.load_record(DIRECTIVE_RECORD, &self.directive).await;
        self.load_record(USER_DATA_RECORD, &self.user_data).await;
    }

    async fn load_record(&self, name: &str, slot: &RwLock<String>) {
        match self.blobs.read(name).await {
            Ok(Some(value)) => {
                tracing::info!(record = name, bytes = value.len(), "loaded record");
                *slot.write() = value;
            }
            Ok(None) => {
                let default = slot.read().clone();
                tracing::info!(record = name, "record missing, seeding default");
                if let Err(err) = self.blobs.write(name, &default).await {
                    tracing::warn!(record = name, error = %err, "failed to seed default");
                }
            }
            Err(err) => {
                tracing::warn!(record = name, error = %err, "failed to read record, keeping default");
            }
        }
    }

    pub fn directive(&self) -> String {
        self.directive.read().clone()
    }

    pub fn user_data(&self) -> String {
        self.user_data.read().clone()
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    /// Replace the directive. Returns whether the durable write succeeded;
    /// memory is updated either way.
    pub async fn set_directive(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        let _guard = self.write_lock.lock().await;
        *self.directive.write() = text.clone();
        self.persist(DIRECTIVE_RECORD, &text).await
    }

    /// Replace the user data and notify every subscriber. Returns whether
    /// the durable write succeeded; memory and subscribers are updated
    /// either way.
    pub async fn set_user_data(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        let _guard = self.write_lock.lock().await;
        *self.user_data.write() = text.clone();
        let persisted = self.persist(USER_DATA_RECORD, &text).await;
        self.bus.broadcast(ServerEvent::user_data_updated(text));
        persisted
    }

    async fn persist(&self, name: &str, value: &str) -> bool {
        match self.blobs.write(name, value).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(record = name, error = %err, "failed to persist record");
                false
            }
        }
    }
}
