//! Persistence layer
//!
//! SQLite behind an r2d2 pool; one repository struct per entity family.
//! Timestamps are stored as RFC 3339 UTC strings.

pub mod blacklist;
pub mod bot;
pub mod catalog;
pub mod event;
pub mod group;
pub mod membership;
pub mod respects;
pub mod role;
mod schema;
pub mod task;
pub mod user;

use std::path::Path;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::{Error, Result};

pub use blacklist::{BlacklistEntry, BlacklistRepo, BlacklistSource};
pub use bot::{BotRepo, BotRow};
pub use catalog::{CatalogRepo, Degree};
pub use event::{EventRepo, EventRow, NewEvent};
pub use group::{GroupRepo, GroupRow};
pub use membership::{MembershipRepo, MembershipRow};
pub use respects::RespectsRepo;
pub use role::{ModOverrides, RightsOverrides, Role, RoleKind, RoleRepo};
pub use schema::SCHEMA_VERSION;
pub use task::{DueTask, TaskRepo};
pub use user::{UserRepo, UserRow};

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled database connection
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Initialize the database
///
/// # Errors
///
/// Returns error if the database cannot be opened or migrated
pub fn init<P: AsRef<Path>>(path: P) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
    });
    let pool = Pool::builder()
        .max_size(8)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    schema::init(&conn)?;

    tracing::info!(version = SCHEMA_VERSION, "database initialized");
    Ok(pool)
}

/// Initialize an in-memory database (for testing)
///
/// # Errors
///
/// Returns error if the database cannot be initialized
pub fn init_memory() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    schema::init(&conn)?;

    Ok(pool)
}

/// Fetch a connection from the pool
pub(crate) fn conn(pool: &DbPool) -> Result<DbConn> {
    pool.get().map_err(|e| Error::Database(e.to_string()))
}

/// Render a timestamp for storage
#[must_use]
pub fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parse a stored timestamp, tolerating junk by falling back to the epoch
#[must_use]
pub fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_memory_creates_schema() {
        let pool = init_memory().unwrap();
        let conn = pool.get().unwrap();
        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn timestamp_round_trip() {
        let now = Utc::now();
        let parsed = parse_ts(&ts(now));
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let early = ts(Utc::now());
        let late = ts(Utc::now() + chrono::Duration::seconds(5));
        assert!(early < late);
    }
}
