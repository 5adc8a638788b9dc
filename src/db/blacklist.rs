//! Network-wide ban list repository
//!
//! Inserting an entry flips the matching user's `banned` flag in the same
//! transaction, so a blacklisted user can never slip through between the
//! two writes.

use rusqlite::{Row, params};

use super::{DbPool, conn};
use crate::Result;

/// Who put a user on the blacklist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistSource {
    /// Inserted by a network administrator
    Administrator,
    /// Pulled from an external blocklist feed
    ExternalFeed,
}

impl BlacklistSource {
    /// Stable storage name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Administrator => "administrator",
            Self::ExternalFeed => "external_feed",
        }
    }

    /// Parse a stored source
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "administrator" => Some(Self::Administrator),
            "external_feed" => Some(Self::ExternalFeed),
            _ => None,
        }
    }
}

/// A blacklist entry
#[derive(Debug, Clone)]
pub struct BlacklistEntry {
    pub user_id: u64,
    pub source: BlacklistSource,
}

impl BlacklistEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let source_raw: String = row.get(1)?;
        Ok(Self {
            user_id: row.get::<_, i64>(0)?.cast_unsigned(),
            source: BlacklistSource::parse(&source_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    1,
                    rusqlite::types::Type::Text,
                    format!("unknown blacklist source {source_raw}").into(),
                )
            })?,
        })
    }
}

/// Repository for the network ban list
#[derive(Debug, Clone)]
pub struct BlacklistRepo {
    pool: DbPool,
}

impl BlacklistRepo {
    /// Create a new repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Whether a user id appears in any partition
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn contains(&self, user_id: u64) -> Result<bool> {
        let conn = conn(&self.pool)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM blacklist WHERE user_id = ?1",
            [user_id.cast_signed()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert an entry and flip the user's ban flag if the user exists
    ///
    /// Returns `true` when a stored user was newly flagged as banned by
    /// this call. Duplicate inserts are treated as already present.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn insert(&self, user_id: u64, source: BlacklistSource) -> Result<bool> {
        let mut conn = conn(&self.pool)?;
        let tx = conn.transaction()?;
        tx.execute(
            r"INSERT INTO blacklist (user_id, source) VALUES (?1, ?2)
              ON CONFLICT(user_id, source) DO NOTHING",
            params![user_id.cast_signed(), source.as_str()],
        )?;
        let flagged = tx.execute(
            "UPDATE users SET banned = 1 WHERE id = ?1 AND banned = 0",
            [user_id.cast_signed()],
        )?;
        tx.commit()?;
        Ok(flagged > 0)
    }

    /// Replace the external-feed partition with a fresh id list
    ///
    /// The swap is atomic; administrator entries are untouched. Returns the
    /// ids of stored users newly flagged as banned.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn replace_external_feed(&self, user_ids: &[u64]) -> Result<Vec<u64>> {
        let mut conn = conn(&self.pool)?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM blacklist WHERE source = 'external_feed'", [])?;

        let mut newly_banned = Vec::new();
        for user_id in user_ids {
            tx.execute(
                r"INSERT INTO blacklist (user_id, source) VALUES (?1, 'external_feed')
                  ON CONFLICT(user_id, source) DO NOTHING",
                [user_id.cast_signed()],
            )?;
            let flagged = tx.execute(
                "UPDATE users SET banned = 1 WHERE id = ?1 AND banned = 0",
                [user_id.cast_signed()],
            )?;
            if flagged > 0 {
                newly_banned.push(*user_id);
            }
        }
        tx.commit()?;
        Ok(newly_banned)
    }

    /// Every entry, administrator partition first
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn list(&self) -> Result<Vec<BlacklistEntry>> {
        let conn = conn(&self.pool)?;
        let mut stmt =
            conn.prepare("SELECT user_id, source FROM blacklist ORDER BY source, user_id")?;
        let entries = stmt
            .query_map([], BlacklistEntry::from_row)?
            .flatten()
            .collect();
        Ok(entries)
    }
}
