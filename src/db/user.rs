//! Telegram user repository

use chrono::{DateTime, Utc};
use rusqlite::{Row, params};

use super::{DbPool, conn, parse_ts, ts};
use crate::Result;
use crate::telegram::types::TgUser;

/// A stored Telegram user
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: u64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language: Option<String>,
    pub reputation: i64,
    pub warn_count: i64,
    pub banned: bool,
    pub permissions_level: i64,
    pub last_seen: DateTime<Utc>,
}

impl UserRow {
    /// Display name: first name plus last name when present
    #[must_use]
    pub fn name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get::<_, i64>(0)?.cast_unsigned(),
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            username: row.get(3)?,
            language: row.get(4)?,
            reputation: row.get(5)?,
            warn_count: row.get(6)?,
            banned: row.get::<_, i64>(7)? != 0,
            permissions_level: row.get(8)?,
            last_seen: parse_ts(&row.get::<_, String>(9)?),
        })
    }
}

const COLUMNS: &str = "id, first_name, last_name, username, language, \
                       reputation, warn_count, banned, permissions_level, last_seen";

/// Repository for Telegram users
#[derive(Debug, Clone)]
pub struct UserRepo {
    pool: DbPool,
}

impl UserRepo {
    /// Create a new repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Look up a user by Telegram id
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn get(&self, id: u64) -> Result<Option<UserRow>> {
        let conn = conn(&self.pool)?;
        let result = conn.query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
            [id.cast_signed()],
            UserRow::from_row,
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a user by username, case-insensitively
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn get_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        let conn = conn(&self.pool)?;
        let result = conn.query_row(
            &format!("SELECT {COLUMNS} FROM users WHERE username = ?1 COLLATE NOCASE"),
            [username],
            UserRow::from_row,
        );
        match result {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Upsert a user from an observed Telegram sender
    ///
    /// Creates the row on first sighting; afterwards refreshes names,
    /// username, language and `last_seen` without touching moderation state.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn upsert_seen(&self, user: &TgUser, seen_at: DateTime<Utc>) -> Result<UserRow> {
        let conn = conn(&self.pool)?;
        conn.execute(
            r"INSERT INTO users (id, first_name, last_name, username, language, last_seen)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6)
              ON CONFLICT(id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                username = excluded.username,
                language = COALESCE(excluded.language, users.language),
                last_seen = excluded.last_seen",
            params![
                user.id.cast_signed(),
                user.first_name,
                user.last_name,
                user.username,
                user.language_code,
                ts(seen_at),
            ],
        )?;
        drop(conn);
        self.get(user.id)?
            .ok_or_else(|| crate::Error::Database("user vanished after upsert".to_string()))
    }

    /// Set the global ban flag
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn set_banned(&self, id: u64, banned: bool) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute(
            "UPDATE users SET banned = ?2 WHERE id = ?1",
            params![id.cast_signed(), i64::from(banned)],
        )?;
        Ok(())
    }

    /// Increment the warn counter, returning the new value
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn add_warn(&self, id: u64) -> Result<i64> {
        let conn = conn(&self.pool)?;
        conn.execute(
            "UPDATE users SET warn_count = warn_count + 1 WHERE id = ?1",
            [id.cast_signed()],
        )?;
        conn.query_row(
            "SELECT warn_count FROM users WHERE id = ?1",
            [id.cast_signed()],
            |row| row.get(0),
        )
        .map_err(Into::into)
    }
}
