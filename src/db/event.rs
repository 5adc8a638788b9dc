//! Append-only event log repository

use chrono::{DateTime, Utc};
use rusqlite::{Row, params};

use super::{DbPool, conn, parse_ts, ts};
use crate::Result;
use crate::events::EventKind;

/// A new event to append
#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub kind: Option<EventKind>,
    pub chat_id: Option<i64>,
    pub target_id: Option<u64>,
    pub issuer_id: Option<u64>,
    pub reason: Option<String>,
    pub message_text: Option<String>,
    pub message_deleted: Option<bool>,
    pub audit_message_id: Option<i64>,
}

/// A stored event
#[derive(Debug, Clone)]
pub struct EventRow {
    pub id: i64,
    pub kind: i64,
    pub chat_id: Option<i64>,
    pub target_id: Option<u64>,
    pub issuer_id: Option<u64>,
    pub reason: Option<String>,
    pub message_text: Option<String>,
    pub message_deleted: Option<bool>,
    pub audit_message_id: Option<i64>,
    pub at: DateTime<Utc>,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            chat_id: row.get(2)?,
            target_id: row.get::<_, Option<i64>>(3)?.map(i64::cast_unsigned),
            issuer_id: row.get::<_, Option<i64>>(4)?.map(i64::cast_unsigned),
            reason: row.get(5)?,
            message_text: row.get(6)?,
            message_deleted: row.get::<_, Option<i64>>(7)?.map(|v| v != 0),
            audit_message_id: row.get(8)?,
            at: parse_ts(&row.get::<_, String>(9)?),
        })
    }
}

const COLUMNS: &str = "id, kind, chat_id, target_id, issuer_id, reason, \
                       message_text, message_deleted, audit_message_id, at";

/// Repository for the event log
#[derive(Debug, Clone)]
pub struct EventRepo {
    pool: DbPool,
}

impl EventRepo {
    /// Create a new repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append an event, returning its id
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails or the kind is unset
    pub fn append(&self, event: &NewEvent, at: DateTime<Utc>) -> Result<i64> {
        let kind = event
            .kind
            .ok_or_else(|| crate::Error::Database("event kind is required".to_string()))?;
        let conn = conn(&self.pool)?;
        conn.execute(
            r"INSERT INTO event_log
                (kind, chat_id, target_id, issuer_id, reason, message_text,
                 message_deleted, audit_message_id, at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                kind.code(),
                event.chat_id,
                event.target_id.map(u64::cast_signed),
                event.issuer_id.map(u64::cast_signed),
                event.reason,
                event.message_text,
                event.message_deleted.map(i64::from),
                event.audit_message_id,
                ts(at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Events of one kind, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn list_by_kind(&self, kind: EventKind) -> Result<Vec<EventRow>> {
        let conn = conn(&self.pool)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM event_log WHERE kind = ?1 ORDER BY id"
        ))?;
        let events = stmt
            .query_map([kind.code()], EventRow::from_row)?
            .flatten()
            .collect();
        Ok(events)
    }

    /// Total number of recorded events
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn count(&self) -> Result<i64> {
        let conn = conn(&self.pool)?;
        conn.query_row("SELECT COUNT(*) FROM event_log", [], |row| row.get(0))
            .map_err(Into::into)
    }
}
