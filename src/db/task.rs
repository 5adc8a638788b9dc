//! Durable scheduled task repository
//!
//! Tasks follow a claim/execute/ack protocol. A claim stamps `started_at`;
//! acking either deletes the row (one-shot) or pushes `not_before` forward
//! and clears the claim (recurring). Claims older than the stale threshold
//! are released so a crashed worker cannot strand work.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Row, params};

use super::{DbPool, conn, parse_ts, ts};
use crate::Result;

/// A claimed task ready to run
#[derive(Debug, Clone)]
pub struct DueTask {
    pub id: i64,
    pub name: String,
    pub payload: serde_json::Value,
    pub recurrence_secs: Option<i64>,
}

impl DueTask {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let raw: String = row.get(2)?;
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            payload: serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null),
            recurrence_secs: row.get(3)?,
        })
    }
}

/// Repository for scheduled tasks
#[derive(Debug, Clone)]
pub struct TaskRepo {
    pool: DbPool,
}

impl TaskRepo {
    /// Create a new repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Enqueue a one-shot task
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn enqueue(
        &self,
        name: &str,
        payload: &serde_json::Value,
        not_before: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = conn(&self.pool)?;
        conn.execute(
            "INSERT INTO tasks (name, payload, not_before) VALUES (?1, ?2, ?3)",
            params![name, payload.to_string(), ts(not_before)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Make sure one recurring task with this name exists
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn ensure_recurring(&self, name: &str, every: Duration) -> Result<()> {
        let conn = conn(&self.pool)?;
        let existing: i64 = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE name = ?1 AND recurrence_secs IS NOT NULL",
            [name],
            |row| row.get(0),
        )?;
        if existing == 0 {
            conn.execute(
                "INSERT INTO tasks (name, payload, not_before, recurrence_secs)
                 VALUES (?1, '{}', ?2, ?3)",
                params![name, ts(Utc::now()), every.num_seconds()],
            )?;
            tracing::info!(name, every_secs = every.num_seconds(), "recurring task seeded");
        }
        Ok(())
    }

    /// Claim the next due task, if any
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<DueTask>> {
        let conn = conn(&self.pool)?;
        let result = conn.query_row(
            r"UPDATE tasks SET started_at = ?1
              WHERE id = (
                  SELECT id FROM tasks
                  WHERE started_at IS NULL AND not_before <= ?1
                  ORDER BY not_before LIMIT 1
              )
              RETURNING id, name, payload, recurrence_secs",
            [ts(now)],
            DueTask::from_row,
        );
        match result {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Acknowledge a finished task
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn ack(&self, task: &DueTask, now: DateTime<Utc>) -> Result<()> {
        let conn = conn(&self.pool)?;
        match task.recurrence_secs {
            Some(secs) => {
                conn.execute(
                    "UPDATE tasks SET started_at = NULL, not_before = ?2 WHERE id = ?1",
                    params![task.id, ts(now + Duration::seconds(secs))],
                )?;
            }
            None => {
                conn.execute("DELETE FROM tasks WHERE id = ?1", [task.id])?;
            }
        }
        Ok(())
    }

    /// Release claims older than the threshold so the work becomes due again
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn release_stale(&self, now: DateTime<Utc>, max_age: Duration) -> Result<usize> {
        let conn = conn(&self.pool)?;
        let released = conn.execute(
            "UPDATE tasks SET started_at = NULL WHERE started_at IS NOT NULL AND started_at < ?1",
            [ts(now - max_age)],
        )?;
        if released > 0 {
            tracing::warn!(released, "released stale task claims");
        }
        Ok(released)
    }

    /// Pending tasks with the given name (diagnostics and tests)
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn pending_by_name(&self, name: &str) -> Result<Vec<(i64, serde_json::Value, DateTime<Utc>)>> {
        let conn = conn(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT id, payload, not_before FROM tasks WHERE name = ?1 ORDER BY not_before",
        )?;
        let tasks = stmt
            .query_map([name], |row| {
                let payload: String = row.get(1)?;
                let not_before: String = row.get(2)?;
                Ok((
                    row.get(0)?,
                    serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
                    parse_ts(&not_before),
                ))
            })?
            .flatten()
            .collect();
        Ok(tasks)
    }
}
