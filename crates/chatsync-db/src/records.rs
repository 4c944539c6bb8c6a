use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::error::Result;

/// Whole-value records addressed by a fixed logical name. Every write
/// replaces the previous value; there is no history.
pub struct Records<'db> {
    pub(crate) db: &'db mut Database,
}

impl Records<'_> {
    pub fn get(&self, name: &str) -> Result<Option<String>> {
        self.db
            .conn
            .query_row(
                "SELECT value FROM records WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn put(&mut self, name: &str, value: &str) -> Result<()> {
        self.db.conn.execute(
            "INSERT INTO records (name, value, updated_at_ms)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                value = excluded.value,
                updated_at_ms = excluded.updated_at_ms",
            params![name, value, now_ms()],
        )?;
        Ok(())
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
