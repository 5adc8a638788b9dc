//! Membership traffic: joins, leaves, bot admission, join requests

use chrono::Utc;

use crate::dispatch::{Outcome, UpdateCtx};
use crate::events::{ChatRef, Event, EventKind};
use crate::propagate;
use crate::sched;
use crate::telegram::retry_once;
use crate::telegram::types::{
    ChatJoinRequest, ChatMemberUpdated, Message, SendMessageRequest, STATUS_ADMINISTRATOR,
    STATUS_KICKED, STATUS_LEFT, STATUS_MEMBER,
};
use crate::texts::{self, Lang};
use crate::{Result, telegram::html};

/// Members above which join/leave banners are considered noise
const SERVICE_MESSAGE_CLEANUP_THRESHOLD: u64 = 50;

/// Handle a `chat_member` status transition
///
/// # Errors
///
/// Returns error if a store operation or an unexpected Telegram call fails
pub async fn handle_transition(ctx: &UpdateCtx, transition: &ChatMemberUpdated) -> Result<Outcome> {
    let member = &transition.new_chat_member.user;
    let old_status = transition.old_chat_member.status.as_str();
    let new_status = transition.new_chat_member.status.as_str();

    let Some(group) = ctx.state.groups().get(transition.chat.id)? else {
        let event = Event {
            chat: Some(ChatRef::from(&transition.chat)),
            ..Event::of(EventKind::ChatDoesNotExist)
        };
        ctx.state.logger.log(&event).await?;
        return Ok(Outcome::Stop);
    };

    match new_status {
        STATUS_LEFT => {
            if ctx.state.users().get(member.id)?.is_some() {
                ctx.state
                    .memberships()
                    .set_status(member.id, group.id, STATUS_LEFT, Utc::now())?;
            }
            let event = Event {
                chat: Some(ChatRef::from(&group)),
                target: Some(member.into()),
                ..Event::of(EventKind::UserLeft)
            };
            ctx.state.logger.log(&event).await?;
        }
        STATUS_KICKED => {
            if ctx.state.users().get(member.id)?.is_some() {
                ctx.state
                    .memberships()
                    .set_status(member.id, group.id, STATUS_KICKED, Utc::now())?;
            }
        }
        STATUS_MEMBER if old_status == STATUS_ADMINISTRATOR => {
            // Back to the ranks: nothing to announce
            if ctx.state.users().get(member.id)?.is_some() {
                ctx.state
                    .memberships()
                    .set_status(member.id, group.id, STATUS_MEMBER, Utc::now())?;
            }
        }
        STATUS_MEMBER if member.is_bot => {
            let username = member.username.as_deref().unwrap_or_default();
            if !ctx.state.bots_repo().is_whitelisted(username)? {
                tracing::info!(bot = username, chat_id = group.id, "kicking unlisted bot");
                ctx.api().ban_chat_member(group.id, member.id).await?;
            }
        }
        STATUS_MEMBER => {
            let user = ctx.state.users().upsert_seen(member, Utc::now())?;
            ctx.state
                .memberships()
                .set_status(user.id, group.id, STATUS_MEMBER, Utc::now())?;

            propagate::apply_admin_rights(&ctx.state, &user, &group, false).await?;

            let event = Event {
                chat: Some(ChatRef::from(&group)),
                target: Some(member.into()),
                ..Event::of(EventKind::UserJoined)
            };
            ctx.state.logger.log(&event).await?;

            let lang = Lang::parse(&group.language);
            let greeting = texts::greetings(lang, &[html::user_link(user.id, &user.name())]);
            let welcome =
                texts::render_welcome(&group.welcome_template, &greeting, &group.title);
            let request = SendMessageRequest::html(group.id, welcome);
            let message_id = retry_once(|| ctx.api().send_message(&request)).await?;
            sched::schedule_message_deletion(&ctx.state, group.id, message_id)?;
        }
        _ => {
            if ctx.state.users().get(member.id)?.is_some() {
                ctx.state
                    .memberships()
                    .set_status(member.id, group.id, new_status, Utc::now())?;
            }
        }
    }

    Ok(Outcome::Stop)
}

/// Delete join/leave service banners in crowded groups
///
/// # Errors
///
/// Returns error if a store operation fails
pub async fn handle_service_message(ctx: &UpdateCtx, message: &Message) -> Result<Outcome> {
    let members = match ctx.api().get_chat_member_count(message.chat.id).await {
        Ok(count) => count,
        Err(e) => {
            tracing::debug!(chat_id = message.chat.id, error = %e, "member count unavailable");
            return Ok(Outcome::Stop);
        }
    };

    if members >= SERVICE_MESSAGE_CLEANUP_THRESHOLD {
        if let Err(e) = ctx
            .api()
            .delete_message(message.chat.id, message.message_id)
            .await
        {
            tracing::debug!(chat_id = message.chat.id, error = %e, "service banner cleanup failed");
        }
    }
    Ok(Outcome::Stop)
}

/// Approve join requests from known users in good standing
///
/// # Errors
///
/// Returns error if a store operation or the approval call fails
pub async fn handle_join_request(ctx: &UpdateCtx, request: &ChatJoinRequest) -> Result<Outcome> {
    let Some(user) = ctx.state.users().get(request.from.id)? else {
        tracing::debug!(user_id = request.from.id, "join request from unknown user ignored");
        return Ok(Outcome::Stop);
    };
    if user.banned {
        tracing::info!(user_id = user.id, chat_id = request.chat.id, "join request from banned user");
        return Ok(Outcome::Stop);
    }

    ctx.api()
        .approve_chat_join_request(request.chat.id, user.id)
        .await?;
    Ok(Outcome::Stop)
}
