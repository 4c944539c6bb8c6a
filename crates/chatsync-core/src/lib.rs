pub mod bus;
pub mod controller;
pub mod document;
pub mod error;
pub mod event;
pub mod session;
pub mod store;
pub mod tool;

pub use bus::{NotificationBus, SubscriberId, Subscription};
pub use controller::{ConversationController, ModelSettings};
pub use document::DocumentStore;
pub use error::{ChatError, StoreError, ToolSpecError};
pub use event::ServerEvent;
pub use session::{Role, Session, SessionLimits, SessionRegistry, Transcript, Turn};
pub use store::{BlobStore, MemoryBlobStore};
pub use tool::{ToolSpec, UpdateUserDataInput};
