use std::path::Path;

use crate::database::Database;
use crate::error::Result;
use crate::records::Records;

/// Handle to the chatsync database. Not `Sync`; share it behind a mutex.
pub struct Store {
    db: Database,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            db: Database::open(path.as_ref())?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            db: Database::open_in_memory()?,
        })
    }

    pub fn records(&mut self) -> Records<'_> {
        Records { db: &mut self.db }
    }
}
