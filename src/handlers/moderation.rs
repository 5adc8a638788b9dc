//! Moderation commands
//!
//! Execution walks a fixed pipeline: parse, authorize, pre-allocate the
//! audit entry for destructive actions, apply the action, delete the
//! command message, record the event, confirm in chat. Unauthorized
//! commands are dropped silently.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::dispatch::{Outcome, UpdateCtx};
use crate::events::{ActorRef, ChatRef, Event, EventKind, EvidenceRef, PreparedEntry};
use crate::handlers::{dossier, sync::message_time};
use crate::perms::{self, ModAction};
use crate::sched;
use crate::telegram::types::{
    ChatPermissions, Message, SendMessageRequest, TgUser, entity_text,
};
use crate::telegram::{BotApi, TgError, retry_once};
use crate::texts::{self, Lang};
use crate::db::{GroupRow, UserRow};
use crate::{Error, Result};

/// A parsed moderation command ready for authorization
#[derive(Debug)]
pub struct ModCommand {
    pub action: ModAction,
    pub target: UserRow,
    pub reason: Option<String>,
    pub until: Option<DateTime<Utc>>,
}

static DURATION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,6})([smhd])$").expect("valid duration pattern"));

/// Parse a mute duration token such as `30s`, `10m`, `2h` or `7d`
#[must_use]
pub fn parse_duration(token: &str) -> Option<Duration> {
    let captures = DURATION_TOKEN.captures(token)?;
    let amount: i64 = captures[1].parse().ok()?;
    if amount == 0 {
        return None;
    }
    match &captures[2] {
        "s" => Some(Duration::seconds(amount)),
        "m" => Some(Duration::minutes(amount)),
        "h" => Some(Duration::hours(amount)),
        "d" => Some(Duration::days(amount)),
        _ => None,
    }
}

/// Resolve the target and reason of a command
///
/// Target precedence: mention or text-mention entity, then a numeric id as
/// the first argument, then the replied-to message's author. Returns
/// `None` when nothing resolves to a known user, or when `/del` is issued
/// without a reply.
///
/// # Errors
///
/// Returns error if a store lookup fails
pub fn parse(ctx: &UpdateCtx, message: &Message, action: ModAction) -> Result<Option<ModCommand>> {
    let text = message.text.clone().unwrap_or_default();
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let args = tokens.get(1..).unwrap_or_default();
    let users = ctx.state.users();

    let mut target: Option<UserRow> = None;
    let mut target_in_text = false;

    for entity in &message.entities {
        match entity.kind.as_str() {
            "mention" => {
                let Some(mention) = entity_text(&text, entity) else {
                    continue;
                };
                if let Some(user) = users.get_by_username(mention.trim_start_matches('@'))? {
                    target = Some(user);
                    target_in_text = true;
                }
            }
            "text_mention" => {
                if let Some(mentioned) = &entity.user {
                    if let Some(user) = users.get(mentioned.id)? {
                        target = Some(user);
                        target_in_text = true;
                    }
                }
            }
            _ => {}
        }
        if target.is_some() {
            break;
        }
    }

    if target.is_none() {
        if let Some(first) = args.first() {
            if let Ok(id) = first.parse::<u64>() {
                if let Some(user) = users.get(id)? {
                    target = Some(user);
                    target_in_text = true;
                }
            }
        }
    }

    if target.is_none() {
        if let Some(author) = message.reply_to_message.as_ref().and_then(|r| r.from.as_ref()) {
            target = users.get(author.id)?;
        }
    }

    let Some(target) = target else {
        return Ok(None);
    };

    // Deleting requires something to delete
    if action == ModAction::Del && message.reply_to_message.is_none() {
        return Ok(None);
    }

    let mut reason_tokens: Vec<String> = args
        .iter()
        .skip(usize::from(target_in_text))
        .map(ToString::to_string)
        .collect();

    let mut until = None;
    if action == ModAction::Mute {
        let trailing = reason_tokens.last().and_then(|t| parse_duration(t));
        if let Some(duration) = trailing {
            reason_tokens.pop();
            until = Some(message_time(message) + duration);
        } else if let Some(duration) = reason_tokens.first().and_then(|t| parse_duration(t)) {
            reason_tokens.remove(0);
            until = Some(message_time(message) + duration);
        }
    }

    let reason = (!reason_tokens.is_empty()).then(|| reason_tokens.join(" "));

    Ok(Some(ModCommand {
        action,
        target,
        reason,
        until,
    }))
}

/// Handle a `/info`-family moderation command
///
/// # Errors
///
/// Returns error if a store operation or an unexpected Telegram call fails
pub async fn handle_command(
    ctx: &UpdateCtx,
    message: &Message,
    action: ModAction,
) -> Result<Outcome> {
    let Some(issuer_tg) = &message.from else {
        return Ok(Outcome::Continue);
    };
    let Some(group) = ctx.state.groups().get(message.chat.id)? else {
        return Ok(Outcome::Stop);
    };
    let lang = Lang::parse(&group.language);

    let Some(command) = parse(ctx, message, action)? else {
        let request = SendMessageRequest::html(group.id, texts::usage_hint(lang));
        if let Err(e) = retry_once(|| ctx.api().send_message(&request)).await {
            tracing::warn!(chat_id = group.id, error = %e, "usage hint failed");
        }
        return Ok(Outcome::Stop);
    };

    let degrees = ctx.state.catalog().degrees_for_chat(group.id)?;
    let roles = ctx.state.roles().list_for_user(issuer_tg.id)?;
    if !perms::resolve(&roles, &degrees).allows(action) {
        tracing::debug!(
            issuer = issuer_tg.id,
            chat_id = group.id,
            command = action.command(),
            "unauthorized moderation command dropped"
        );
        return Ok(Outcome::Stop);
    }

    let issuer = ActorRef::from(issuer_tg);

    if action == ModAction::Info {
        send_dossier(ctx, issuer_tg, &command.target).await;
        delete_command_message(ctx, message).await;
        let event = Event {
            chat: Some(ChatRef::from(&group)),
            target: Some((&command.target).into()),
            issuer: Some(issuer),
            ..Event::of(EventKind::ModerationInfo)
        };
        ctx.state.logger.log(&event).await?;
        return Ok(Outcome::Stop);
    }

    // Pre-allocate the audit entry and secure the evidence before acting
    let evidence = message.reply_to_message.as_ref().map(|reply| EvidenceRef {
        chat_id: reply.chat.id,
        message_id: reply.message_id,
    });
    let prepared = ctx.state.logger.prepare(evidence).await?;
    let reply_text = message
        .reply_to_message
        .as_ref()
        .and_then(|reply| reply.text.clone());

    if action.is_cross_group() {
        execute_cross_group(ctx, &group, &command, &issuer, prepared).await?;
        delete_command_message(ctx, message).await;
        send_confirmation(ctx, &group, lang, &command).await;
        return Ok(Outcome::Stop);
    }

    match execute_in_chat(ctx, &group, message, &command).await {
        Ok(()) => {}
        Err(Error::Telegram(TgError::NotEnoughRights)) => {
            let event = Event {
                chat: Some(ChatRef::from(&group)),
                target: Some((&command.target).into()),
                ..Event::of(EventKind::NotEnoughRights)
            };
            ctx.state.logger.log_prepared(prepared, &event).await?;
            return Ok(Outcome::Stop);
        }
        Err(e) => return Err(e),
    }

    delete_command_message(ctx, message).await;

    let event = Event {
        kind: Some(action.event()),
        chat: Some(ChatRef::from(&group)),
        target: Some((&command.target).into()),
        issuer: Some(issuer),
        reason: command.reason.clone(),
        message_text: reply_text,
        message_deleted: action == ModAction::Del,
        until: command.until,
        evidence,
        ..Event::default()
    };
    ctx.state.logger.log_prepared(prepared, &event).await?;

    if action != ModAction::Del {
        send_confirmation(ctx, &group, lang, &command).await;
    }

    Ok(Outcome::Stop)
}

/// Apply a single-group action through the chat's own bot
async fn execute_in_chat(
    ctx: &UpdateCtx,
    group: &GroupRow,
    message: &Message,
    command: &ModCommand,
) -> Result<()> {
    let api = ctx.api();
    let target_id = command.target.id;

    match command.action {
        ModAction::Del => {
            if let Some(reply) = &message.reply_to_message {
                retry_once(|| api.delete_message(reply.chat.id, reply.message_id)).await?;
            }
        }
        ModAction::Warn => {
            ctx.state.users().add_warn(target_id)?;
        }
        ModAction::Kick => {
            // Unban of a present member boots them while allowing a rejoin
            retry_once(|| api.unban_chat_member(group.id, target_id, false)).await?;
        }
        ModAction::Mute => {
            let until = command.until.map(|u| u.timestamp());
            retry_once(|| {
                api.restrict_chat_member(group.id, target_id, ChatPermissions::muted(), until)
            })
            .await?;
        }
        ModAction::Ban => {
            retry_once(|| api.ban_chat_member(group.id, target_id)).await?;
        }
        ModAction::Free => {
            free_member(api, group.id, target_id).await?;
        }
        ModAction::Info | ModAction::Superban | ModAction::Superfree => {}
    }
    Ok(())
}

/// Unban and restore the full send suite
async fn free_member(api: &BotApi, chat_id: i64, user_id: u64) -> Result<()> {
    retry_once(|| api.unban_chat_member(chat_id, user_id, true)).await?;
    retry_once(|| {
        api.restrict_chat_member(chat_id, user_id, ChatPermissions::send_suite(), None)
    })
    .await?;
    Ok(())
}

/// Apply a superban/superfree across every group the target belongs to
///
/// Groups are walked sequentially; per-group failures are recorded and do
/// not abort the remainder. The global ban flag flips at the end.
async fn execute_cross_group(
    ctx: &UpdateCtx,
    origin: &GroupRow,
    command: &ModCommand,
    issuer: &ActorRef,
    prepared: PreparedEntry,
) -> Result<()> {
    let banning = command.action == ModAction::Superban;
    let target = &command.target;
    let groups = ctx.state.groups();
    let mut prepared = Some(prepared);

    for group_id in ctx.state.memberships().groups_of(target.id)? {
        let Some(group) = groups.get(group_id)? else {
            continue;
        };
        let Ok(bot) = ctx.state.api_for_group(&group).await else {
            tracing::warn!(group_id, "no bot available, skipping group");
            continue;
        };

        let result = if banning {
            retry_once(|| bot.api.ban_chat_member(group.id, target.id)).await
        } else {
            free_member(&bot.api, group.id, target.id)
                .await
                .map_err(|e| match e {
                    Error::Telegram(tg) => tg,
                    other => TgError::Api(other.to_string()),
                })
        };

        let event = match result {
            Ok(()) => Event {
                kind: Some(command.action.event()),
                chat: Some(ChatRef::from(&group)),
                target: Some(target.into()),
                issuer: Some(issuer.clone()),
                reason: command.reason.clone(),
                ..Event::default()
            },
            Err(TgError::NotEnoughRights) => Event {
                chat: Some(ChatRef::from(&group)),
                target: Some(target.into()),
                ..Event::of(EventKind::NotEnoughRights)
            },
            Err(TgError::ChatNotFound) => Event {
                chat: Some(ChatRef::from(&group)),
                ..Event::of(EventKind::ChatDoesNotExist)
            },
            Err(e) => Event {
                chat: Some(ChatRef::from(&group)),
                target: Some(target.into()),
                error_message: Some(e.to_string()),
                ..Event::of(EventKind::TelegramError)
            },
        };

        match prepared.take() {
            Some(entry) => {
                ctx.state.logger.log_prepared(entry, &event).await?;
            }
            None => {
                ctx.state.logger.log(&event).await?;
            }
        }
    }

    // Target without any membership: resolve the placeholder anyway
    if let Some(entry) = prepared {
        let event = Event {
            kind: Some(command.action.event()),
            chat: Some(ChatRef::from(origin)),
            target: Some(target.into()),
            issuer: Some(issuer.clone()),
            reason: command.reason.clone(),
            ..Event::default()
        };
        ctx.state.logger.log_prepared(entry, &event).await?;
    }

    ctx.state.users().set_banned(target.id, banning)?;
    Ok(())
}

/// DM the issuer the target's dossier, chunked to the message limit
async fn send_dossier(ctx: &UpdateCtx, issuer: &TgUser, target: &UserRow) {
    let chunks = match dossier::build(ctx, target) {
        Ok(chunks) => chunks,
        Err(e) => {
            tracing::warn!(target = target.id, error = %e, "dossier build failed");
            return;
        }
    };

    let issuer_chat = issuer.id.cast_signed();
    for chunk in chunks {
        let request = SendMessageRequest::html(issuer_chat, chunk);
        if let Err(e) = retry_once(|| ctx.api().send_message(&request)).await {
            // The issuer must open a private chat with the bot first
            tracing::info!(issuer = issuer.id, error = %e, "dossier delivery failed");
            return;
        }
    }
}

/// Delete the command message itself; rate limits defer to the scheduler
async fn delete_command_message(ctx: &UpdateCtx, message: &Message) {
    match ctx
        .api()
        .delete_message(message.chat.id, message.message_id)
        .await
    {
        Ok(()) | Err(TgError::MessageNotFound) => {}
        Err(TgError::RetryAfter(seconds)) => {
            if let Err(e) = sched::schedule_message_deletion_after(
                &ctx.state,
                message.chat.id,
                message.message_id,
                seconds.cast_signed(),
            ) {
                tracing::warn!(error = %e, "could not defer command deletion");
            }
        }
        Err(e) => {
            tracing::debug!(chat_id = message.chat.id, error = %e, "command deletion failed");
        }
    }
}

/// Post the localized confirmation and schedule its cleanup
async fn send_confirmation(ctx: &UpdateCtx, group: &GroupRow, lang: Lang, command: &ModCommand) {
    let text = texts::confirmation(
        lang,
        command.action,
        &command.target.name(),
        command.reason.as_deref(),
    );
    let request = SendMessageRequest::html(group.id, text);
    match retry_once(|| ctx.api().send_message(&request)).await {
        Ok(message_id) => {
            if let Err(e) = sched::schedule_message_deletion(&ctx.state, group.id, message_id) {
                tracing::warn!(error = %e, "could not schedule confirmation cleanup");
            }
        }
        Err(e) => tracing::warn!(chat_id = group.id, error = %e, "confirmation failed"),
    }
}

/// Toggle the group's @admin opt-out (`/ignore_admin`)
///
/// # Errors
///
/// Returns error if a store operation fails
pub async fn handle_toggle_admin_tagging(ctx: &UpdateCtx, message: &Message) -> Result<Outcome> {
    let Some(issuer) = &message.from else {
        return Ok(Outcome::Continue);
    };
    let Some(group) = ctx.state.groups().get(message.chat.id)? else {
        return Ok(Outcome::Stop);
    };

    let degrees = ctx.state.catalog().degrees_for_chat(group.id)?;
    let roles = ctx.state.roles().list_for_user(issuer.id)?;
    if !perms::resolve(&roles, &degrees).rights.can_restrict_members {
        return Ok(Outcome::Stop);
    }

    let ignored = ctx.state.groups().toggle_ignore_admin_tagging(group.id)?;
    let lang = Lang::parse(&group.language);
    let request =
        SendMessageRequest::html(group.id, texts::admin_tagging_toggled(lang, ignored));
    if let Ok(message_id) = retry_once(|| ctx.api().send_message(&request)).await {
        let _ = sched::schedule_message_deletion(&ctx.state, group.id, message_id);
    }
    delete_command_message(ctx, message).await;
    Ok(Outcome::Stop)
}

/// Whitelist bots mentioned in the command (`/whitelist @Some_bot`)
///
/// # Errors
///
/// Returns error if a store operation fails
pub async fn handle_whitelist(ctx: &UpdateCtx, message: &Message) -> Result<Outcome> {
    let Some(issuer) = &message.from else {
        return Ok(Outcome::Continue);
    };
    let Some(group) = ctx.state.groups().get(message.chat.id)? else {
        return Ok(Outcome::Stop);
    };

    let degrees = ctx.state.catalog().degrees_for_chat(group.id)?;
    let roles = ctx.state.roles().list_for_user(issuer.id)?;
    if !perms::resolve(&roles, &degrees).allows(ModAction::Superban) {
        return Ok(Outcome::Stop);
    }

    let bots = ctx.state.bots_repo();
    for (_, mention) in message.entities_of("mention") {
        if !mention.to_lowercase().ends_with("bot") {
            continue;
        }
        bots.whitelist(&mention, Some(issuer.id))?;
        let event = Event {
            chat: Some(ChatRef::from(&group)),
            issuer: Some(issuer.into()),
            reason: Some(mention.clone()),
            ..Event::of(EventKind::WhitelistBot)
        };
        ctx.state.logger.log(&event).await?;
    }

    delete_command_message(ctx, message).await;
    Ok(Outcome::Stop)
}
