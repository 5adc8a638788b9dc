//! Staff role repository
//!
//! Roles are stored flat with a variant discriminator. Override columns are
//! tri-state: NULL inherits the variant default, 0 denies, 1 grants. The
//! merge semantics live in [`crate::perms`]; this module only persists.

use rusqlite::{Row, params};

use super::{DbPool, conn};
use crate::Result;

/// Role variant discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    Representative,
    Professor,
    Moderator,
    Administrator,
    SuperAdministrator,
}

impl RoleKind {
    /// Stable storage name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Representative => "representative",
            Self::Professor => "professor",
            Self::Moderator => "moderator",
            Self::Administrator => "administrator",
            Self::SuperAdministrator => "superadministrator",
        }
    }

    /// Parse a stored discriminator
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "representative" => Some(Self::Representative),
            "professor" => Some(Self::Professor),
            "moderator" => Some(Self::Moderator),
            "administrator" => Some(Self::Administrator),
            "superadministrator" => Some(Self::SuperAdministrator),
            _ => None,
        }
    }

    /// Variants whose holders are on call for @admin reports
    pub const ON_CALL: [Self; 3] = [Self::Moderator, Self::Administrator, Self::SuperAdministrator];
}

/// Tri-state moderation capability overrides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModOverrides {
    pub info: Option<bool>,
    pub del: Option<bool>,
    pub warn: Option<bool>,
    pub kick: Option<bool>,
    pub ban: Option<bool>,
    pub mute: Option<bool>,
    pub free: Option<bool>,
    pub superban: Option<bool>,
    pub superfree: Option<bool>,
}

/// Tri-state Telegram admin-right overrides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RightsOverrides {
    pub change_info: Option<bool>,
    pub invite_users: Option<bool>,
    pub pin_messages: Option<bool>,
    pub manage_chat: Option<bool>,
    pub delete_messages: Option<bool>,
    pub manage_voice_chats: Option<bool>,
    pub restrict_members: Option<bool>,
    pub promote_members: Option<bool>,
}

/// A staff role grant
#[derive(Debug, Clone)]
pub struct Role {
    pub id: i64,
    pub user_id: u64,
    pub kind: RoleKind,
    /// Applies to every managed group
    pub all_groups: bool,
    /// Applies to groups not reachable from any degree
    pub extra_groups: bool,
    /// Degrees this role is scoped to
    pub degrees: Vec<i64>,
    pub custom_title: Option<String>,
    /// Political office held, representatives only
    pub political_role: Option<String>,
    /// Political list the representative was elected with
    pub political_list: Option<String>,
    pub moderation: ModOverrides,
    pub rights: RightsOverrides,
}

impl Role {
    /// A role with no overrides, scoped to nothing
    #[must_use]
    pub fn new(user_id: u64, kind: RoleKind) -> Self {
        Self {
            id: 0,
            user_id,
            kind,
            all_groups: false,
            extra_groups: false,
            degrees: Vec::new(),
            custom_title: None,
            political_role: None,
            political_list: None,
            moderation: ModOverrides::default(),
            rights: RightsOverrides::default(),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind_raw: String = row.get(2)?;
        let kind = RoleKind::parse(&kind_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown role kind {kind_raw}").into(),
            )
        })?;
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get::<_, i64>(1)?.cast_unsigned(),
            kind,
            all_groups: row.get::<_, i64>(3)? != 0,
            extra_groups: row.get::<_, i64>(4)? != 0,
            degrees: Vec::new(),
            custom_title: row.get(5)?,
            political_role: row.get(23)?,
            political_list: row.get(24)?,
            moderation: ModOverrides {
                info: tri(row, 6)?,
                del: tri(row, 7)?,
                warn: tri(row, 8)?,
                kick: tri(row, 9)?,
                ban: tri(row, 10)?,
                mute: tri(row, 11)?,
                free: tri(row, 12)?,
                superban: tri(row, 13)?,
                superfree: tri(row, 14)?,
            },
            rights: RightsOverrides {
                change_info: tri(row, 15)?,
                invite_users: tri(row, 16)?,
                pin_messages: tri(row, 17)?,
                manage_chat: tri(row, 18)?,
                delete_messages: tri(row, 19)?,
                manage_voice_chats: tri(row, 20)?,
                restrict_members: tri(row, 21)?,
                promote_members: tri(row, 22)?,
            },
        })
    }
}

fn tri(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<bool>> {
    Ok(row.get::<_, Option<i64>>(index)?.map(|v| v != 0))
}

const COLUMNS: &str = "id, user_id, kind, all_groups, extra_groups, custom_title, \
    mod_info, mod_del, mod_warn, mod_kick, mod_ban, mod_mute, mod_free, \
    mod_superban, mod_superfree, \
    right_change_info, right_invite_users, right_pin_messages, right_manage_chat, \
    right_delete_messages, right_manage_voice_chats, right_restrict_members, \
    right_promote_members, political_role, political_list";

/// Repository for staff roles
#[derive(Debug, Clone)]
pub struct RoleRepo {
    pool: DbPool,
}

impl RoleRepo {
    /// Create a new repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a role together with its degree links, returning the id
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn insert(&self, role: &Role) -> Result<i64> {
        let mut conn = conn(&self.pool)?;
        let tx = conn.transaction()?;
        tx.execute(
            r"INSERT INTO roles
                (user_id, kind, all_groups, extra_groups, custom_title,
                 political_role, political_list,
                 mod_info, mod_del, mod_warn, mod_kick, mod_ban, mod_mute,
                 mod_free, mod_superban, mod_superfree,
                 right_change_info, right_invite_users, right_pin_messages,
                 right_manage_chat, right_delete_messages, right_manage_voice_chats,
                 right_restrict_members, right_promote_members)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                      ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
            params![
                role.user_id.cast_signed(),
                role.kind.as_str(),
                i64::from(role.all_groups),
                i64::from(role.extra_groups),
                role.custom_title,
                role.political_role,
                role.political_list,
                role.moderation.info.map(i64::from),
                role.moderation.del.map(i64::from),
                role.moderation.warn.map(i64::from),
                role.moderation.kick.map(i64::from),
                role.moderation.ban.map(i64::from),
                role.moderation.mute.map(i64::from),
                role.moderation.free.map(i64::from),
                role.moderation.superban.map(i64::from),
                role.moderation.superfree.map(i64::from),
                role.rights.change_info.map(i64::from),
                role.rights.invite_users.map(i64::from),
                role.rights.pin_messages.map(i64::from),
                role.rights.manage_chat.map(i64::from),
                role.rights.delete_messages.map(i64::from),
                role.rights.manage_voice_chats.map(i64::from),
                role.rights.restrict_members.map(i64::from),
                role.rights.promote_members.map(i64::from),
            ],
        )?;
        let role_id = tx.last_insert_rowid();
        for degree_id in &role.degrees {
            tx.execute(
                "INSERT INTO role_degrees (role_id, degree_id) VALUES (?1, ?2)",
                params![role_id, degree_id],
            )?;
        }
        tx.commit()?;
        Ok(role_id)
    }

    /// Delete a role, returning its owner for re-propagation
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn delete(&self, role_id: i64) -> Result<Option<u64>> {
        let conn = conn(&self.pool)?;
        let owner = conn
            .query_row(
                "SELECT user_id FROM roles WHERE id = ?1",
                [role_id],
                |row| row.get::<_, i64>(0),
            )
            .map(i64::cast_unsigned);
        match owner {
            Ok(user_id) => {
                conn.execute("DELETE FROM roles WHERE id = ?1", [role_id])?;
                Ok(Some(user_id))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All roles held by a user, degree links included
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn list_for_user(&self, user_id: u64) -> Result<Vec<Role>> {
        let conn = conn(&self.pool)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM roles WHERE user_id = ?1 ORDER BY id"
        ))?;
        let mut roles: Vec<Role> = stmt
            .query_map([user_id.cast_signed()], Role::from_row)?
            .flatten()
            .collect();
        for role in &mut roles {
            role.degrees = self.degrees_of(&conn, role.id)?;
        }
        Ok(roles)
    }

    /// All on-call roles (moderator and up), degree links included
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn list_on_call(&self) -> Result<Vec<Role>> {
        let conn = conn(&self.pool)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM roles
             WHERE kind IN ('moderator', 'administrator', 'superadministrator')
             ORDER BY id"
        ))?;
        let mut roles: Vec<Role> = stmt.query_map([], Role::from_row)?.flatten().collect();
        for role in &mut roles {
            role.degrees = self.degrees_of(&conn, role.id)?;
        }
        Ok(roles)
    }

    fn degrees_of(&self, conn: &rusqlite::Connection, role_id: i64) -> Result<Vec<i64>> {
        let mut stmt =
            conn.prepare("SELECT degree_id FROM role_degrees WHERE role_id = ?1 ORDER BY degree_id")?;
        let ids = stmt.query_map([role_id], |row| row.get(0))?.flatten().collect();
        Ok(ids)
    }
}
