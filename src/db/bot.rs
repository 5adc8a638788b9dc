//! Bot registry and bot whitelist repository
//!
//! The bot token is the capability that authenticates webhook traffic, so
//! it doubles as the primary key and must never leave this layer except to
//! build API clients.

use rusqlite::{Row, params};

use super::{DbPool, conn};
use crate::Result;

/// A registered bot
#[derive(Debug, Clone)]
pub struct BotRow {
    pub token: String,
    pub username: String,
    pub notes: Option<String>,
}

impl BotRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            token: row.get(0)?,
            username: row.get(1)?,
            notes: row.get(2)?,
        })
    }
}

/// Repository for registered bots and the bot whitelist
#[derive(Debug, Clone)]
pub struct BotRepo {
    pool: DbPool,
}

impl BotRepo {
    /// Create a new repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Authenticate a webhook token
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn get_by_token(&self, token: &str) -> Result<Option<BotRow>> {
        let conn = conn(&self.pool)?;
        let result = conn.query_row(
            "SELECT token, username, notes FROM bots WHERE token = ?1",
            [token],
            BotRow::from_row,
        );
        match result {
            Ok(bot) => Ok(Some(bot)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Register a bot
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn insert(&self, bot: &BotRow) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute(
            "INSERT INTO bots (token, username, notes) VALUES (?1, ?2, ?3)",
            params![bot.token, bot.username, bot.notes],
        )?;
        Ok(())
    }

    /// Whether a bot username may stay when it joins a group
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn is_whitelisted(&self, username: &str) -> Result<bool> {
        let conn = conn(&self.pool)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM bot_whitelist WHERE username = ?1 COLLATE NOCASE",
            [username],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Add a bot username to the whitelist
    ///
    /// Re-adding an already whitelisted bot is treated as already present.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn whitelist(&self, username: &str, whitelisted_by: Option<u64>) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute(
            r"INSERT INTO bot_whitelist (username, whitelisted_by) VALUES (?1, ?2)
              ON CONFLICT(username) DO NOTHING",
            params![username, whitelisted_by.map(u64::cast_signed)],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn token_authentication() {
        let pool = db::init_memory().unwrap();
        let repo = BotRepo::new(pool);
        repo.insert(&BotRow {
            token: "111:AAA".to_string(),
            username: "campus_algebra_bot".to_string(),
            notes: None,
        })
        .unwrap();

        assert!(repo.get_by_token("111:AAA").unwrap().is_some());
        assert!(repo.get_by_token("111:BBB").unwrap().is_none());
    }

    #[test]
    fn whitelist_is_idempotent_and_case_insensitive() {
        let pool = db::init_memory().unwrap();
        let repo = BotRepo::new(pool);

        assert!(!repo.is_whitelisted("@GroupButler_bot").unwrap());
        repo.whitelist("@GroupButler_bot", None).unwrap();
        repo.whitelist("@GroupButler_bot", None).unwrap();
        assert!(repo.is_whitelisted("@groupbutler_bot").unwrap());
    }
}
