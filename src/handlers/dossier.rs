//! User dossier rendering for `/info`

use crate::db::{GroupRow, MembershipRow, UserRow};
use crate::dispatch::UpdateCtx;
use crate::telegram::html;
use crate::Result;

/// Build the dossier chunks for a target user
///
/// # Errors
///
/// Returns error if a store lookup fails
pub fn build(ctx: &UpdateCtx, target: &UserRow) -> Result<Vec<String>> {
    let memberships = ctx.state.memberships().list_for_user(target.id)?;
    let groups = ctx.state.groups();
    let mut resolved = Vec::with_capacity(memberships.len());
    for membership in memberships {
        if let Some(group) = groups.get(membership.group_id)? {
            resolved.push((membership, group));
        }
    }
    Ok(render(target, &resolved, &ctx.state.config.admin_base_url))
}

/// Render the dossier as chunks that each fit one message
#[must_use]
pub fn render(
    user: &UserRow,
    memberships: &[(MembershipRow, GroupRow)],
    admin_base_url: &str,
) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push(format!(
        "\u{1f464} <b>Utente</b> {} [{}]",
        html::user_link(user.id, &user.name()),
        user.id
    ));
    if let Some(username) = &user.username {
        lines.push(format!(
            "\u{1f516} <b>Username</b>: @{}",
            html::escape(username)
        ));
    }
    lines.push(format!(
        "\u{1f53a} <b>Reputazione</b>: {}",
        user.reputation
    ));
    lines.push(format!(
        "\u{1f7e1} <b>Ammonizioni</b>: {}",
        user.warn_count
    ));
    lines.push(format!(
        "\u{1f46e}\u{200d} <b>Livello di permessi</b>: {}",
        user.permissions_level
    ));
    lines.push(format!(
        "\u{1f557} <b>Ultimo messaggio</b>: {}",
        user.last_seen.format("%d-%m-%Y %H:%M:%S")
    ));
    if user.banned {
        lines.push(
            "\u{26ab}\u{fe0f} <b>Il membro \u{e8} bannato globalmente dal network</b>.".to_string(),
        );
    }

    if !memberships.is_empty() {
        lines.push(String::new());
        lines.push("\u{1f465} <b>\u{c8} stato visto nei seguenti gruppi</b>:".to_string());
        for (membership, group) in memberships {
            lines.push(format!(
                "\u{25a0} {}",
                membership_line(membership, group, user.id, admin_base_url)
            ));
        }
    }

    html::chunk_lines(&lines, html::MESSAGE_LIMIT)
}

/// One bullet of the membership list
///
/// `[<id>|AG|AU|L|STA] Title` with admin-console links for the group and
/// the user, the invite link when known, and the abbreviated status.
fn membership_line(
    membership: &MembershipRow,
    group: &GroupRow,
    user_id: u64,
    admin_base_url: &str,
) -> String {
    let mut text = format!("[<code>{}</code>|", group.id);
    text.push_str(&format!(
        "<a href=\"{admin_base_url}/telegram/group/{}\">AG</a>|",
        group.id
    ));
    text.push_str(&format!(
        "<a href=\"{admin_base_url}/telegram/user/{user_id}\">AU</a>|"
    ));
    if let Some(invite) = &group.invite_link {
        text.push_str(&format!("<a href=\"{invite}\">L</a>|"));
    }
    let status: String = membership.status.chars().take(3).collect();
    text.push_str(&status.to_uppercase());
    text.push_str(&format!("] {}", html::escape(&group.title)));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(banned: bool) -> UserRow {
        UserRow {
            id: 42,
            first_name: "Ada".to_string(),
            last_name: Some("L.".to_string()),
            username: Some("ada".to_string()),
            language: None,
            reputation: 3,
            warn_count: 1,
            banned,
            permissions_level: 2,
            last_seen: Utc::now(),
        }
    }

    fn membership(group_id: i64, messages: i64) -> MembershipRow {
        MembershipRow {
            user_id: 42,
            group_id,
            status: "administrator".to_string(),
            last_seen: Utc::now(),
            messages_count: messages,
        }
    }

    fn group(id: i64, invite: Option<&str>) -> GroupRow {
        GroupRow {
            id,
            title: format!("Group {id}"),
            description: None,
            invite_link: invite.map(String::from),
            language: "it".to_string(),
            welcome_template: String::new(),
            owner_id: None,
            bot_token: None,
            ignore_admin_tagging: false,
        }
    }

    #[test]
    fn dossier_lists_identity_and_groups() {
        let chunks = render(
            &user(false),
            &[
                (membership(-1, 10), group(-1, Some("https://t.me/x"))),
                (membership(-2, 5), group(-2, None)),
            ],
            "https://admin.example.org",
        );
        assert_eq!(chunks.len(), 1);
        let text = &chunks[0];
        assert!(text.contains("tg://user?id=42"));
        assert!(text.contains("@ada"));
        assert!(text.contains("Ammonizioni</b>: 1"));
        assert!(text.contains("ADM] Group -1"));
        assert!(text.contains("https://admin.example.org/telegram/group/-1"));
        assert!(text.contains("<a href=\"https://t.me/x\">L</a>"));
        assert!(!text.contains("bannato globalmente"));
    }

    #[test]
    fn dossier_flags_global_ban() {
        let chunks = render(&user(true), &[], "https://admin.example.org");
        assert!(chunks[0].contains("bannato globalmente"));
    }

    #[test]
    fn dossier_chunks_stay_within_limit() {
        let memberships: Vec<(MembershipRow, GroupRow)> = (0..400)
            .map(|i| (membership(-i, i), group(-i, None)))
            .collect();
        let chunks = render(&user(false), &memberships, "https://admin.example.org");
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= html::MESSAGE_LIMIT);
        }
    }
}
