//! Managed group repository

use rusqlite::{Row, params};

use super::{DbPool, conn};
use crate::Result;

/// A stored group chat
#[derive(Debug, Clone)]
pub struct GroupRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub invite_link: Option<String>,
    pub language: String,
    pub welcome_template: String,
    pub owner_id: Option<u64>,
    pub bot_token: Option<String>,
    pub ignore_admin_tagging: bool,
}

impl GroupRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            invite_link: row.get(3)?,
            language: row.get(4)?,
            welcome_template: row.get(5)?,
            owner_id: row.get::<_, Option<i64>>(6)?.map(i64::cast_unsigned),
            bot_token: row.get(7)?,
            ignore_admin_tagging: row.get::<_, i64>(8)? != 0,
        })
    }
}

const COLUMNS: &str = "id, title, description, invite_link, language, \
                       welcome_template, owner_id, bot_token, ignore_admin_tagging";

/// Repository for managed groups
#[derive(Debug, Clone)]
pub struct GroupRepo {
    pool: DbPool,
}

impl GroupRepo {
    /// Create a new repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Look up a group by chat id
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn get(&self, id: i64) -> Result<Option<GroupRow>> {
        let conn = conn(&self.pool)?;
        let result = conn.query_row(
            &format!("SELECT {COLUMNS} FROM groups WHERE id = ?1"),
            [id],
            GroupRow::from_row,
        );
        match result {
            Ok(group) => Ok(Some(group)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List every managed group
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn list(&self) -> Result<Vec<GroupRow>> {
        let conn = conn(&self.pool)?;
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM groups ORDER BY id"))?;
        let groups = stmt.query_map([], GroupRow::from_row)?.flatten().collect();
        Ok(groups)
    }

    /// Refresh the title when Telegram reports a different one
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn refresh_title(&self, id: i64, title: &str) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute(
            "UPDATE groups SET title = ?2 WHERE id = ?1 AND title <> ?2",
            params![id, title],
        )?;
        Ok(())
    }

    /// Refresh metadata fetched from `getChat`
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn refresh_info(
        &self,
        id: i64,
        title: &str,
        description: Option<&str>,
        invite_link: Option<&str>,
        owner_id: Option<u64>,
    ) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute(
            r"UPDATE groups
              SET title = ?2, description = ?3, invite_link = ?4,
                  owner_id = COALESCE(?5, owner_id)
              WHERE id = ?1",
            params![
                id,
                title,
                description,
                invite_link,
                owner_id.map(u64::cast_signed)
            ],
        )?;
        Ok(())
    }

    /// Flip the @admin opt-out flag, returning the new value
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn toggle_ignore_admin_tagging(&self, id: i64) -> Result<bool> {
        let conn = conn(&self.pool)?;
        conn.execute(
            "UPDATE groups SET ignore_admin_tagging = 1 - ignore_admin_tagging WHERE id = ?1",
            [id],
        )?;
        conn.query_row(
            "SELECT ignore_admin_tagging FROM groups WHERE id = ?1",
            [id],
            |row| Ok(row.get::<_, i64>(0)? != 0),
        )
        .map_err(Into::into)
    }

    /// Insert a group (admin-plane seeding and tests)
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn insert(&self, group: &GroupRow) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute(
            r"INSERT INTO groups
                (id, title, description, invite_link, language, welcome_template,
                 owner_id, bot_token, ignore_admin_tagging)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                group.id,
                group.title,
                group.description,
                group.invite_link,
                group.language,
                group.welcome_template,
                group.owner_id.map(u64::cast_signed),
                group.bot_token,
                i64::from(group.ignore_admin_tagging),
            ],
        )?;
        Ok(())
    }
}
