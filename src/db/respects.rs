//! Respects counter repository (the F-press meme)

use rusqlite::params;

use super::{DbPool, conn};
use crate::Result;

/// Repository for per-message respects counters
#[derive(Debug, Clone)]
pub struct RespectsRepo {
    pool: DbPool,
}

impl RespectsRepo {
    /// Create a new repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Register a fresh counter for a sent meme message
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn create(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute(
            r"INSERT INTO respects (chat_id, message_id, count) VALUES (?1, ?2, 0)
              ON CONFLICT(chat_id, message_id) DO NOTHING",
            params![chat_id, message_id],
        )?;
        Ok(())
    }

    /// Increment a counter, returning the new total
    ///
    /// Returns `None` when no counter exists for the message.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn bump(&self, chat_id: i64, message_id: i64) -> Result<Option<i64>> {
        let conn = conn(&self.pool)?;
        let updated = conn.execute(
            "UPDATE respects SET count = count + 1 WHERE chat_id = ?1 AND message_id = ?2",
            params![chat_id, message_id],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        let count = conn.query_row(
            "SELECT count FROM respects WHERE chat_id = ?1 AND message_id = ?2",
            params![chat_id, message_id],
            |row| row.get(0),
        )?;
        Ok(Some(count))
    }
}
