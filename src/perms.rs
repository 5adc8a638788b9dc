//! Permission resolution
//!
//! Pure functions from a user's roles and a chat's degree set to the
//! effective moderation capabilities, Telegram admin rights and custom
//! title. No side effects; callers load the inputs from the store.

use std::collections::HashSet;

use crate::db::{ModOverrides, RightsOverrides, Role, RoleKind};
use crate::events::EventKind;
use crate::telegram::types::AdminRights;

/// A moderation capability, one per command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModAction {
    Info,
    Del,
    Warn,
    Kick,
    Ban,
    Mute,
    Free,
    Superban,
    Superfree,
}

impl ModAction {
    /// Every action, in command-table order
    pub const ALL: [Self; 9] = [
        Self::Info,
        Self::Del,
        Self::Warn,
        Self::Kick,
        Self::Ban,
        Self::Mute,
        Self::Free,
        Self::Superban,
        Self::Superfree,
    ];

    /// The slash command that triggers this action
    #[must_use]
    pub const fn command(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Del => "del",
            Self::Warn => "warn",
            Self::Kick => "kick",
            Self::Ban => "ban",
            Self::Mute => "mute",
            Self::Free => "free",
            Self::Superban => "superban",
            Self::Superfree => "superfree",
        }
    }

    /// Parse a lowercased command name
    #[must_use]
    pub fn from_command(command: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.command() == command)
    }

    /// The event kind recorded when this action is applied
    #[must_use]
    pub const fn event(self) -> EventKind {
        match self {
            Self::Info => EventKind::ModerationInfo,
            Self::Del => EventKind::ModerationDel,
            Self::Warn => EventKind::ModerationWarn,
            Self::Kick => EventKind::ModerationKick,
            Self::Ban => EventKind::ModerationBan,
            Self::Mute => EventKind::ModerationMute,
            Self::Free => EventKind::ModerationFree,
            Self::Superban => EventKind::ModerationSuperban,
            Self::Superfree => EventKind::ModerationSuperfree,
        }
    }

    /// Whether the action spans every group the target belongs to
    #[must_use]
    pub const fn is_cross_group(self) -> bool {
        matches!(self, Self::Superban | Self::Superfree)
    }

    fn override_of(self, overrides: &ModOverrides) -> Option<bool> {
        match self {
            Self::Info => overrides.info,
            Self::Del => overrides.del,
            Self::Warn => overrides.warn,
            Self::Kick => overrides.kick,
            Self::Ban => overrides.ban,
            Self::Mute => overrides.mute,
            Self::Free => overrides.free,
            Self::Superban => overrides.superban,
            Self::Superfree => overrides.superfree,
        }
    }
}

/// Capabilities granted by a role variant before overrides
#[must_use]
pub fn default_caps(kind: RoleKind) -> &'static [ModAction] {
    match kind {
        RoleKind::Representative | RoleKind::Professor => &[],
        RoleKind::Moderator => &[ModAction::Info, ModAction::Del, ModAction::Mute],
        RoleKind::Administrator => &[
            ModAction::Info,
            ModAction::Del,
            ModAction::Warn,
            ModAction::Kick,
            ModAction::Ban,
            ModAction::Mute,
            ModAction::Free,
        ],
        RoleKind::SuperAdministrator => &ModAction::ALL,
    }
}

/// Telegram rights granted by a role variant before overrides
#[must_use]
pub fn default_rights(kind: RoleKind) -> AdminRights {
    match kind {
        RoleKind::Representative | RoleKind::Professor => AdminRights {
            can_pin_messages: true,
            ..AdminRights::default()
        },
        RoleKind::Moderator => AdminRights {
            can_pin_messages: true,
            can_manage_chat: true,
            ..AdminRights::default()
        },
        RoleKind::Administrator => AdminRights {
            can_pin_messages: true,
            can_change_info: true,
            ..AdminRights::default()
        },
        RoleKind::SuperAdministrator => AdminRights::all(),
    }
}

/// Title shown for a role variant when no override is set
///
/// Representatives have no fixed fallback; their title is composed from
/// the political fields in [`role_title`].
#[must_use]
pub const fn default_title(kind: RoleKind) -> Option<&'static str> {
    match kind {
        RoleKind::Representative => None,
        RoleKind::Professor => Some("Docente"),
        RoleKind::Moderator => Some("Moderatore"),
        RoleKind::Administrator => Some("Amministratore"),
        RoleKind::SuperAdministrator => Some("CdA Network"),
    }
}

/// Title contributed by one role instance
///
/// The explicit override wins; a representative then composes
/// `{political_role} {political_list}`; other variants fall back to the
/// fixed variant title.
#[must_use]
pub fn role_title(role: &Role) -> Option<String> {
    if let Some(title) = role.custom_title.clone().filter(|t| !t.is_empty()) {
        return Some(title);
    }
    if role.kind == RoleKind::Representative {
        let list = role.political_list.as_deref().unwrap_or_default();
        let composed = match role.political_role.as_deref().filter(|r| !r.is_empty()) {
            Some(office) => format!("{office} {list}"),
            None => list.to_string(),
        };
        return (!composed.trim().is_empty()).then(|| composed.trim().to_string());
    }
    default_title(role.kind).map(String::from)
}

/// Whether a role governs the given chat
///
/// `chat_degrees` is the set of degrees the chat is relevant to; an empty
/// set marks an extra group.
#[must_use]
pub fn applies(role: &Role, chat_degrees: &[i64]) -> bool {
    if role.all_groups {
        return true;
    }
    if chat_degrees.is_empty() {
        return role.extra_groups;
    }
    role.degrees.iter().any(|d| chat_degrees.contains(d))
}

/// The effective (capabilities, rights, title) triple
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    pub caps: HashSet<ModAction>,
    pub rights: AdminRights,
    pub custom_title: Option<String>,
}

impl Resolved {
    /// Whether the user holds the capability for an action
    #[must_use]
    pub fn allows(&self, action: ModAction) -> bool {
        self.caps.contains(&action)
    }

    /// Whether there is nothing to promote for
    #[must_use]
    pub fn is_plain_member(&self) -> bool {
        self.caps.is_empty() && self.rights.is_empty() && self.custom_title.is_none()
    }
}

/// Capabilities of a single role: variant defaults merged with overrides
///
/// A null override inherits, an explicit grant adds, an explicit deny
/// removes even a variant default.
#[must_use]
pub fn role_caps(role: &Role) -> HashSet<ModAction> {
    let defaults = default_caps(role.kind);
    ModAction::ALL
        .into_iter()
        .filter(|action| {
            action
                .override_of(&role.moderation)
                .unwrap_or_else(|| defaults.contains(action))
        })
        .collect()
}

fn merge_right(
    effective: &mut bool,
    denied: &mut bool,
    override_value: Option<bool>,
    default_value: bool,
) {
    match override_value {
        Some(false) => *denied = true,
        Some(true) => *effective = true,
        None => *effective = *effective || default_value,
    }
}

/// Resolve the effective permission triple for a (user, chat) pair
///
/// Capabilities are the union of each applicable role's effective set.
/// A right is granted when any role grants it, unless some role denies it
/// explicitly. The custom title is the last one produced in role order.
#[must_use]
pub fn resolve(roles: &[Role], chat_degrees: &[i64]) -> Resolved {
    let mut resolved = Resolved::default();
    let mut denied = [false; 8];

    for role in roles.iter().filter(|r| applies(r, chat_degrees)) {
        resolved.caps.extend(role_caps(role));

        let defaults = default_rights(role.kind);
        let overrides: &RightsOverrides = &role.rights;
        let rights = &mut resolved.rights;
        merge_right(&mut rights.can_change_info, &mut denied[0], overrides.change_info, defaults.can_change_info);
        merge_right(&mut rights.can_invite_users, &mut denied[1], overrides.invite_users, defaults.can_invite_users);
        merge_right(&mut rights.can_pin_messages, &mut denied[2], overrides.pin_messages, defaults.can_pin_messages);
        merge_right(&mut rights.can_manage_chat, &mut denied[3], overrides.manage_chat, defaults.can_manage_chat);
        merge_right(&mut rights.can_delete_messages, &mut denied[4], overrides.delete_messages, defaults.can_delete_messages);
        merge_right(&mut rights.can_manage_voice_chats, &mut denied[5], overrides.manage_voice_chats, defaults.can_manage_voice_chats);
        merge_right(&mut rights.can_restrict_members, &mut denied[6], overrides.restrict_members, defaults.can_restrict_members);
        merge_right(&mut rights.can_promote_members, &mut denied[7], overrides.promote_members, defaults.can_promote_members);

        if let Some(title) = role_title(role) {
            resolved.custom_title = Some(title);
        }
    }

    let rights = &mut resolved.rights;
    for (index, slot) in [
        &mut rights.can_change_info,
        &mut rights.can_invite_users,
        &mut rights.can_pin_messages,
        &mut rights.can_manage_chat,
        &mut rights.can_delete_messages,
        &mut rights.can_manage_voice_chats,
        &mut rights.can_restrict_members,
        &mut rights.can_promote_members,
    ]
    .into_iter()
    .enumerate()
    {
        if denied[index] {
            *slot = false;
        }
    }

    resolved
}
