//! Group-0 invariants: user, group and membership bookkeeping
//!
//! Runs before anything else on every message-bearing group update. After
//! this handler either the sender and membership rows are fresh, or the
//! chain is stopped.

use chrono::{DateTime, Utc};

use crate::dispatch::{Outcome, UpdateCtx};
use crate::events::{ChatRef, Event, EventKind};
use crate::telegram::TgError;
use crate::telegram::types::Message;
use crate::{Error, Result};

/// Sync the sender and their membership; enforce the network ban list
///
/// # Errors
///
/// Returns error if a store operation or an unexpected Telegram call fails
pub async fn handle_group_message(ctx: &UpdateCtx, message: &Message) -> Result<Outcome> {
    let Some(sender) = &message.from else {
        return Ok(Outcome::Continue);
    };

    // The bot's own traffic is never processed
    if ctx.bot.user_id() == Some(sender.id) {
        return Ok(Outcome::Stop);
    }

    let groups = ctx.state.groups();
    let Some(group) = groups.get(message.chat.id)? else {
        let event = Event {
            chat: Some(ChatRef::from(&message.chat)),
            ..Event::of(EventKind::ChatDoesNotExist)
        };
        ctx.state.logger.log(&event).await?;
        if let Err(e) = ctx.api().leave_chat(message.chat.id).await {
            tracing::debug!(chat_id = message.chat.id, error = %e, "could not leave unknown chat");
        }
        return Ok(Outcome::Stop);
    };

    if let Some(title) = message.chat.title.as_deref() {
        groups.refresh_title(group.id, title)?;
    }

    let seen_at = message_time(message);
    let users = ctx.state.users();
    let user = users.upsert_seen(sender, seen_at)?;

    // A blacklist hit flips the global flag exactly once
    let mut banned = user.banned;
    if !banned && ctx.state.blacklist().contains(user.id)? {
        users.set_banned(user.id, true)?;
        let event = Event {
            chat: Some(ChatRef::from(&group)),
            target: Some((&user).into()),
            ..Event::of(EventKind::ModerationSuperban)
        };
        ctx.state.logger.log(&event).await?;
        banned = true;
    }

    if banned {
        match ctx.api().ban_chat_member(group.id, user.id).await {
            Ok(()) => {}
            Err(TgError::NotEnoughRights) => {
                let event = Event {
                    chat: Some(ChatRef::from(&group)),
                    target: Some((&user).into()),
                    ..Event::of(EventKind::NotEnoughRights)
                };
                ctx.state.logger.log(&event).await?;
            }
            Err(e) => return Err(Error::Telegram(e)),
        }
        return Ok(Outcome::Stop);
    }

    let counts_message = !message.is_membership_service();
    ctx.state
        .memberships()
        .upsert_seen(user.id, group.id, seen_at, counts_message)?;

    Ok(Outcome::Continue)
}

/// Timestamp of a message, falling back to the wall clock
#[must_use]
pub fn message_time(message: &Message) -> DateTime<Utc> {
    DateTime::from_timestamp(message.date, 0).unwrap_or_else(Utc::now)
}
