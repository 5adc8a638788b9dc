//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 3;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }
    if version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Telegram users, created on first sighting
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT,
            username TEXT,
            language TEXT,
            reputation INTEGER NOT NULL DEFAULT 0,
            warn_count INTEGER NOT NULL DEFAULT 0,
            banned INTEGER NOT NULL DEFAULT 0,
            permissions_level INTEGER NOT NULL DEFAULT 0,
            last_seen TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);
        CREATE INDEX IF NOT EXISTS idx_users_banned ON users(id, banned);

        -- Bots pushing updates into the gateway; token doubles as the key
        CREATE TABLE IF NOT EXISTS bots (
            token TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            notes TEXT
        );

        -- Managed group chats
        CREATE TABLE IF NOT EXISTS groups (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            invite_link TEXT,
            language TEXT NOT NULL DEFAULT 'it',
            welcome_template TEXT NOT NULL
                DEFAULT '<b>{greetings}</b> nel gruppo {title}',
            owner_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
            bot_token TEXT REFERENCES bots(token) ON DELETE SET NULL,
            ignore_admin_tagging INTEGER NOT NULL DEFAULT 0
        );

        -- One row per (user, group) pair
        CREATE TABLE IF NOT EXISTS memberships (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'member',
            last_seen TEXT NOT NULL,
            messages_count INTEGER NOT NULL DEFAULT 0,
            UNIQUE(user_id, group_id)
        );

        CREATE INDEX IF NOT EXISTS idx_memberships_user ON memberships(user_id);
        CREATE INDEX IF NOT EXISTS idx_memberships_group ON memberships(group_id);

        -- Bots allowed to stay when they join a group
        CREATE TABLE IF NOT EXISTS bot_whitelist (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            whitelisted_by INTEGER REFERENCES users(id) ON DELETE SET NULL
        );

        -- Catalog: departments own degrees, degrees own courses
        CREATE TABLE IF NOT EXISTS departments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS degrees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            department_id INTEGER NOT NULL REFERENCES departments(id) ON DELETE CASCADE,
            group_id INTEGER REFERENCES groups(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_degrees_group ON degrees(group_id);

        CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            group_id INTEGER REFERENCES groups(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_courses_group ON courses(group_id);

        CREATE TABLE IF NOT EXISTS course_degrees (
            course_id INTEGER NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
            degree_id INTEGER NOT NULL REFERENCES degrees(id) ON DELETE CASCADE,
            year INTEGER NOT NULL DEFAULT 0,
            semester INTEGER NOT NULL DEFAULT 0,
            UNIQUE(course_id, degree_id)
        );

        -- Staff roles; kind is the variant discriminator, override columns
        -- are tri-state (NULL inherits the variant default)
        CREATE TABLE IF NOT EXISTS roles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            kind TEXT NOT NULL CHECK(kind IN (
                'representative', 'professor', 'moderator',
                'administrator', 'superadministrator'
            )),
            all_groups INTEGER NOT NULL DEFAULT 0,
            extra_groups INTEGER NOT NULL DEFAULT 0,
            custom_title TEXT,
            mod_info INTEGER,
            mod_del INTEGER,
            mod_warn INTEGER,
            mod_kick INTEGER,
            mod_ban INTEGER,
            mod_mute INTEGER,
            mod_free INTEGER,
            mod_superban INTEGER,
            mod_superfree INTEGER,
            right_change_info INTEGER,
            right_invite_users INTEGER,
            right_pin_messages INTEGER,
            right_manage_chat INTEGER,
            right_delete_messages INTEGER,
            right_manage_voice_chats INTEGER,
            right_restrict_members INTEGER,
            right_promote_members INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_roles_user ON roles(user_id);

        CREATE TABLE IF NOT EXISTS role_degrees (
            role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
            degree_id INTEGER NOT NULL REFERENCES degrees(id) ON DELETE CASCADE,
            UNIQUE(role_id, degree_id)
        );

        -- Network-wide ban list, partitioned by who inserted the entry
        CREATE TABLE IF NOT EXISTS blacklist (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            source TEXT NOT NULL CHECK(source IN ('administrator', 'external_feed')),
            UNIQUE(user_id, source)
        );

        CREATE INDEX IF NOT EXISTS idx_blacklist_user ON blacklist(user_id);

        -- Append-only event record
        CREATE TABLE IF NOT EXISTS event_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind INTEGER NOT NULL,
            chat_id INTEGER,
            target_id INTEGER,
            issuer_id INTEGER,
            reason TEXT,
            message_text TEXT,
            message_deleted INTEGER,
            audit_message_id INTEGER,
            at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_event_log_kind ON event_log(kind);
        CREATE INDEX IF NOT EXISTS idx_event_log_chat ON event_log(chat_id);

        -- Durable scheduled work
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            payload TEXT NOT NULL DEFAULT '{}',
            not_before TEXT NOT NULL,
            recurrence_secs INTEGER,
            started_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(not_before, started_at);

        PRAGMA user_version = 1;
        ",
    )?;
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Per-bot meme counters survive restarts
        CREATE TABLE IF NOT EXISTS respects (
            chat_id INTEGER NOT NULL,
            message_id INTEGER NOT NULL,
            count INTEGER NOT NULL DEFAULT 0,
            UNIQUE(chat_id, message_id)
        );

        PRAGMA user_version = 2;
        ",
    )?;
    Ok(())
}

fn migrate_v3(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Representative roles compose their default title from these
        ALTER TABLE roles ADD COLUMN political_role TEXT;
        ALTER TABLE roles ADD COLUMN political_list TEXT;

        PRAGMA user_version = 3;
        ",
    )?;
    Ok(())
}
