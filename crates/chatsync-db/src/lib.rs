//! Durable key-value records for chatsync, backed by SQLite.

mod database;
pub mod error;
mod migration;
pub mod records;
pub mod store;

pub use error::{Error, Result};
pub use records::Records;
pub use store::Store;
