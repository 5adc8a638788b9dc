//! @admin mentions: staff triage notifications
//!
//! When someone tags @admin in a participating group, the on-call roster
//! for that chat is mentioned in the staff chat together with a deep link
//! to the triggering message.

use std::collections::HashSet;

use crate::dispatch::{Outcome, UpdateCtx};
use crate::events::{ChatRef, Event, EventKind};
use crate::perms;
use crate::sched;
use crate::telegram::retry_once;
use crate::telegram::types::{Message, SendMessageRequest};
use crate::texts::{self, Lang};
use crate::{Result, telegram::html};

/// Whether the message tags @admin
#[must_use]
pub fn mentions_admin(message: &Message) -> bool {
    message
        .entities_of("mention")
        .iter()
        .any(|(_, text)| text.eq_ignore_ascii_case("@admin"))
}

/// Notify the staff chat and acknowledge in the group
///
/// # Errors
///
/// Returns error if a store operation fails
pub async fn handle(ctx: &UpdateCtx, message: &Message) -> Result<Outcome> {
    let Some(sender) = &message.from else {
        return Ok(Outcome::Continue);
    };
    let Some(group) = ctx.state.groups().get(message.chat.id)? else {
        return Ok(Outcome::Stop);
    };
    if group.ignore_admin_tagging {
        return Ok(Outcome::Stop);
    }

    // On-call roster: every moderating role whose scope covers this chat
    let degrees = ctx.state.catalog().degrees_for_chat(group.id)?;
    let users = ctx.state.users();
    let mut staff = Vec::new();
    let mut seen: HashSet<u64> = HashSet::new();
    for role in ctx.state.roles().list_on_call()? {
        if !perms::applies(&role, &degrees) || !seen.insert(role.user_id) {
            continue;
        }
        if let Some(user) = users.get(role.user_id)? {
            staff.push(user);
        }
    }

    let text = notification_text(&group.title, sender, message, &staff);
    let request = SendMessageRequest::html(ctx.state.config.staff_chat_id, text);
    if let Err(e) = retry_once(|| ctx.api().send_message(&request)).await {
        tracing::warn!(error = %e, "staff notification failed");
    }

    let lang = Lang::parse(&group.language);
    let ack = SendMessageRequest::html(group.id, texts::admin_call_ack(lang));
    if let Ok(message_id) = retry_once(|| ctx.api().send_message(&ack)).await {
        if let Err(e) = sched::schedule_message_deletion(&ctx.state, group.id, message_id) {
            tracing::warn!(error = %e, "could not schedule ack cleanup");
        }
    }

    let event = Event {
        chat: Some(ChatRef::from(&group)),
        issuer: Some(sender.into()),
        ..Event::of(EventKind::UserCalledAdmin)
    };
    ctx.state.logger.log(&event).await?;

    Ok(Outcome::Stop)
}

fn notification_text(
    group_title: &str,
    sender: &crate::telegram::types::TgUser,
    message: &Message,
    staff: &[crate::db::UserRow],
) -> String {
    let sender_name = sender
        .username
        .clone()
        .unwrap_or_else(|| sender.first_name.clone());

    let mut text = format!(
        "A user has tagged @admin\n\
         \u{1f464} <b>Issuer</b>: {} [{}]\n\
         \u{1f465} <b>Group</b>: {} [{}]",
        html::escape(&sender_name),
        html::user_link(sender.id, &sender.id.to_string()),
        html::escape(group_title),
        html::message_link(message.chat.id, message.message_id),
    );

    text.push_str("\n\u{1f46e} <b>Please respond</b> ");
    for user in staff {
        let label = user
            .username
            .as_ref()
            .map_or_else(|| user.first_name.clone(), |u| format!("@{u}"));
        text.push_str(&html::user_link(user.id, &label));
        text.push(' ');
    }

    if let Some(reply) = &message.reply_to_message {
        if let Some(target) = &reply.from {
            text.push_str(&format!(
                "\n<b>Target</b>: {} [{}]",
                html::escape(&target.first_name),
                html::user_link(target.id, &target.id.to_string()),
            ));
        }
        text.push_str(&format!(
            "\n\u{1f4dc} <b>Message</b>: {} [<a href=\"{}\">{}</a>]",
            html::escape(reply.text.as_deref().unwrap_or_default()),
            html::message_link(reply.chat.id, reply.message_id),
            reply.message_id,
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::types::{MessageEntity, TgChat, TgUser};

    fn message_with(text: &str, entities: Vec<MessageEntity>) -> Message {
        Message {
            message_id: 5,
            from: Some(TgUser {
                id: 1,
                is_bot: false,
                first_name: "Alice".to_string(),
                last_name: None,
                username: None,
                language_code: None,
            }),
            chat: TgChat {
                id: -1_001_234,
                kind: "supergroup".to_string(),
                title: Some("G".to_string()),
                username: None,
                description: None,
                invite_link: None,
            },
            date: 0,
            text: Some(text.to_string()),
            entities,
            reply_to_message: None,
            new_chat_members: Vec::new(),
            left_chat_member: None,
        }
    }

    #[test]
    fn detects_admin_mention() {
        let msg = message_with(
            "hey @admin please look",
            vec![MessageEntity {
                kind: "mention".to_string(),
                offset: 4,
                length: 6,
                user: None,
            }],
        );
        assert!(mentions_admin(&msg));
    }

    #[test]
    fn ignores_other_mentions() {
        let msg = message_with(
            "hey @administrator",
            vec![MessageEntity {
                kind: "mention".to_string(),
                offset: 4,
                length: 14,
                user: None,
            }],
        );
        assert!(!mentions_admin(&msg));
        assert!(!mentions_admin(&message_with("@admin without entity", vec![])));
    }
}
