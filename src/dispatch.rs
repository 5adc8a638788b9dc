//! Update dispatcher
//!
//! Handlers are organized in numbered priority groups: 0 runs the sync
//! invariants, 1 handles membership traffic and @admin scans, 2 the
//! moderation commands, 3 user commands, 4 private-chat callbacks. Within
//! a group the first matching handler runs; a [`Outcome::Stop`] return
//! short-circuits every later group.

use std::sync::Arc;

use crate::app::{AppState, BotCtx};
use crate::events::{ChatRef, Event, EventKind};
use crate::handlers::{admin_tag, members, memes, moderation, sync};
use crate::perms::ModAction;
use crate::telegram::TgError;
use crate::telegram::types::{Message, Update};
use crate::{Error, Result};

/// Control signal threaded through the handler chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Evaluate the next handler group
    Continue,
    /// Terminate processing of this update
    Stop,
}

/// Request-scoped context handed to every handler
#[derive(Clone)]
pub struct UpdateCtx {
    pub state: Arc<AppState>,
    pub bot: Arc<BotCtx>,
}

impl UpdateCtx {
    /// The API client of the bot that received the update
    #[must_use]
    pub fn api(&self) -> &crate::telegram::BotApi {
        &self.bot.api
    }
}

/// Extract a command name from a message, stripping the bot-name suffix
///
/// `/Kick@SomeBot reason` addressed to another bot returns `None`; commands
/// are matched case-insensitively.
#[must_use]
pub fn command_name(message: &Message, bot_username: &str) -> Option<String> {
    let text = message.text.as_deref()?;
    let first = text.split_whitespace().next()?;
    let command = first.strip_prefix('/')?;
    let (name, suffix) = match command.split_once('@') {
        Some((name, suffix)) => (name, Some(suffix)),
        None => (command, None),
    };
    if let Some(suffix) = suffix {
        if !suffix.eq_ignore_ascii_case(bot_username) {
            return None;
        }
    }
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}

/// Process one update through the handler groups
///
/// Handler failures are recorded as `TELEGRAM_ERROR` events and end the
/// chain; they are never surfaced to the ingress response.
pub async fn dispatch(ctx: &UpdateCtx, update: &Update) {
    if let Err(e) = run_groups(ctx, update).await {
        report_failure(ctx, update, &e).await;
    }
}

async fn run_groups(ctx: &UpdateCtx, update: &Update) -> Result<()> {
    // Group 0: sync invariants on any message-bearing update
    if let Some(message) = update.any_message() {
        if message.chat.is_group() && sync::handle_group_message(ctx, message).await? == Outcome::Stop
        {
            return Ok(());
        }
    }

    // Group 1: membership transitions, service banners, @admin scans
    if let Some(transition) = &update.chat_member {
        if members::handle_transition(ctx, transition).await? == Outcome::Stop {
            return Ok(());
        }
    } else if let Some(message) = update.any_message() {
        if message.is_membership_service() {
            if members::handle_service_message(ctx, message).await? == Outcome::Stop {
                return Ok(());
            }
        } else if message.chat.is_group()
            && admin_tag::mentions_admin(message)
            && admin_tag::handle(ctx, message).await? == Outcome::Stop
        {
            return Ok(());
        }
    }

    // Group 2: moderation commands
    if let Some(message) = update.any_message() {
        if message.chat.is_group() {
            if let Some(command) = command_name(message, &ctx.bot.row.username) {
                if let Some(action) = ModAction::from_command(&command) {
                    if moderation::handle_command(ctx, message, action).await? == Outcome::Stop {
                        return Ok(());
                    }
                } else if command == "ignore_admin" {
                    if moderation::handle_toggle_admin_tagging(ctx, message).await?
                        == Outcome::Stop
                    {
                        return Ok(());
                    }
                } else if command == "whitelist"
                    && moderation::handle_whitelist(ctx, message).await? == Outcome::Stop
                {
                    return Ok(());
                }
            }
        }
    }

    // Group 3: user commands
    if let Some(message) = update.any_message() {
        if let Some(command) = command_name(message, &ctx.bot.row.username) {
            if command == "respects" && memes::handle_respects(ctx, message).await? == Outcome::Stop
            {
                return Ok(());
            }
        }
    }

    // Group 4: private-chat callbacks and join requests
    if let Some(callback) = &update.callback_query {
        if callback.data.as_deref() == Some("press_f") {
            memes::handle_press_f(ctx, callback).await?;
            return Ok(());
        }
    }
    if let Some(join_request) = &update.chat_join_request {
        members::handle_join_request(ctx, join_request).await?;
    }

    Ok(())
}

async fn report_failure(ctx: &UpdateCtx, update: &Update, error: &Error) {
    tracing::error!(error = %error, "update processing failed");

    // Telegram-level failures land in the audit chat like any other event
    if let Error::Telegram(tg_error) = error {
        if matches!(tg_error, TgError::Transport(_)) {
            return;
        }
        let chat = update
            .any_message()
            .map(|m| &m.chat)
            .or(update.chat_member.as_ref().map(|t| &t.chat))
            .map(ChatRef::from);
        let event = Event {
            chat,
            error_message: Some(tg_error.to_string()),
            ..Event::of(EventKind::TelegramError)
        };
        if let Err(log_error) = ctx.state.logger.log(&event).await {
            tracing::warn!(error = %log_error, "could not record telegram error event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::types::{TgChat, TgUser};

    fn message(text: &str) -> Message {
        Message {
            message_id: 1,
            from: Some(TgUser {
                id: 1,
                is_bot: false,
                first_name: "A".to_string(),
                last_name: None,
                username: None,
                language_code: None,
            }),
            chat: TgChat {
                id: -1,
                kind: "supergroup".to_string(),
                title: None,
                username: None,
                description: None,
                invite_link: None,
            },
            date: 0,
            text: Some(text.to_string()),
            entities: Vec::new(),
            reply_to_message: None,
            new_chat_members: Vec::new(),
            left_chat_member: None,
        }
    }

    #[test]
    fn command_name_lowercases_and_strips_suffix() {
        let msg = message("/Kick@Campus_Bot flooding");
        assert_eq!(command_name(&msg, "campus_bot").as_deref(), Some("kick"));
    }

    #[test]
    fn command_for_other_bot_ignored() {
        let msg = message("/kick@other_bot flooding");
        assert_eq!(command_name(&msg, "campus_bot"), None);
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(command_name(&message("hello /kick"), "campus_bot"), None);
        assert_eq!(command_name(&message("/"), "campus_bot"), None);
    }
}
