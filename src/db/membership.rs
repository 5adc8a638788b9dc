//! Group membership repository

use chrono::{DateTime, Utc};
use rusqlite::{Row, params};

use super::{DbPool, conn, parse_ts, ts};
use crate::Result;

/// A stored (user, group) membership
#[derive(Debug, Clone)]
pub struct MembershipRow {
    pub user_id: u64,
    pub group_id: i64,
    pub status: String,
    pub last_seen: DateTime<Utc>,
    pub messages_count: i64,
}

impl MembershipRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get::<_, i64>(0)?.cast_unsigned(),
            group_id: row.get(1)?,
            status: row.get(2)?,
            last_seen: parse_ts(&row.get::<_, String>(3)?),
            messages_count: row.get(4)?,
        })
    }
}

const COLUMNS: &str = "user_id, group_id, status, last_seen, messages_count";

/// Repository for group memberships
#[derive(Debug, Clone)]
pub struct MembershipRepo {
    pool: DbPool,
}

impl MembershipRepo {
    /// Create a new repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fetch a single membership
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn get(&self, user_id: u64, group_id: i64) -> Result<Option<MembershipRow>> {
        let conn = conn(&self.pool)?;
        let result = conn.query_row(
            &format!("SELECT {COLUMNS} FROM memberships WHERE user_id = ?1 AND group_id = ?2"),
            params![user_id.cast_signed(), group_id],
            MembershipRow::from_row,
        );
        match result {
            Ok(membership) => Ok(Some(membership)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Record a sighting of a user in a group
    ///
    /// Inserts the row on first interaction. `counts_message` increments the
    /// message counter and is reserved for genuine user messages, not status
    /// updates.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn upsert_seen(
        &self,
        user_id: u64,
        group_id: i64,
        seen_at: DateTime<Utc>,
        counts_message: bool,
    ) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute(
            r"INSERT INTO memberships (user_id, group_id, last_seen, messages_count)
              VALUES (?1, ?2, ?3, ?4)
              ON CONFLICT(user_id, group_id) DO UPDATE SET
                last_seen = excluded.last_seen,
                messages_count = memberships.messages_count + ?4",
            params![
                user_id.cast_signed(),
                group_id,
                ts(seen_at),
                i64::from(counts_message)
            ],
        )?;
        Ok(())
    }

    /// Update the Telegram status of a membership, creating it if missing
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn set_status(
        &self,
        user_id: u64,
        group_id: i64,
        status: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute(
            r"INSERT INTO memberships (user_id, group_id, status, last_seen)
              VALUES (?1, ?2, ?3, ?4)
              ON CONFLICT(user_id, group_id) DO UPDATE SET
                status = excluded.status,
                last_seen = excluded.last_seen",
            params![user_id.cast_signed(), group_id, status, ts(seen_at)],
        )?;
        Ok(())
    }

    /// Ids of every group the user is known to be in
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn groups_of(&self, user_id: u64) -> Result<Vec<i64>> {
        let conn = conn(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT group_id FROM memberships WHERE user_id = ?1 ORDER BY group_id",
        )?;
        let ids = stmt
            .query_map([user_id.cast_signed()], |row| row.get(0))?
            .flatten()
            .collect();
        Ok(ids)
    }

    /// Memberships of a user, most active groups first
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn list_for_user(&self, user_id: u64) -> Result<Vec<MembershipRow>> {
        let conn = conn(&self.pool)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM memberships WHERE user_id = ?1 ORDER BY messages_count DESC"
        ))?;
        let memberships = stmt
            .query_map([user_id.cast_signed()], MembershipRow::from_row)?
            .flatten()
            .collect();
        Ok(memberships)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::telegram::types::TgUser;

    fn seed(pool: &DbPool, user_id: u64, group_id: i64) {
        db::UserRepo::new(pool.clone())
            .upsert_seen(
                &TgUser {
                    id: user_id,
                    is_bot: false,
                    first_name: "U".to_string(),
                    last_name: None,
                    username: None,
                    language_code: None,
                },
                Utc::now(),
            )
            .unwrap();
        db::GroupRepo::new(pool.clone())
            .insert(&db::GroupRow {
                id: group_id,
                title: "G".to_string(),
                description: None,
                invite_link: None,
                language: "it".to_string(),
                welcome_template: "{greetings} {title}".to_string(),
                owner_id: None,
                bot_token: None,
                ignore_admin_tagging: false,
            })
            .unwrap();
    }

    #[test]
    fn message_counter_only_counts_messages() {
        let pool = db::init_memory().unwrap();
        seed(&pool, 1, -10);
        let repo = MembershipRepo::new(pool);

        repo.upsert_seen(1, -10, Utc::now(), true).unwrap();
        repo.upsert_seen(1, -10, Utc::now(), false).unwrap();
        repo.upsert_seen(1, -10, Utc::now(), true).unwrap();

        let membership = repo.get(1, -10).unwrap().unwrap();
        assert_eq!(membership.messages_count, 2);
        assert_eq!(membership.status, "member");
    }

    #[test]
    fn status_transitions_without_losing_counter() {
        let pool = db::init_memory().unwrap();
        seed(&pool, 2, -11);
        let repo = MembershipRepo::new(pool);

        repo.upsert_seen(2, -11, Utc::now(), true).unwrap();
        repo.set_status(2, -11, "administrator", Utc::now()).unwrap();

        let membership = repo.get(2, -11).unwrap().unwrap();
        assert_eq!(membership.status, "administrator");
        assert_eq!(membership.messages_count, 1);
    }

    #[test]
    fn list_sorted_by_activity() {
        let pool = db::init_memory().unwrap();
        seed(&pool, 3, -20);
        seed(&pool, 3, -21);
        let repo = MembershipRepo::new(pool);

        repo.upsert_seen(3, -20, Utc::now(), true).unwrap();
        for _ in 0..5 {
            repo.upsert_seen(3, -21, Utc::now(), true).unwrap();
        }

        let memberships = repo.list_for_user(3).unwrap();
        assert_eq!(memberships.len(), 2);
        assert_eq!(memberships[0].group_id, -21);
        assert_eq!(repo.groups_of(3).unwrap(), vec![-21, -20]);
    }
}
