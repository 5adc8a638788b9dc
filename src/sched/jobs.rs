//! Scheduled job implementations

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;

use super::{TASK_DELETE_MESSAGE, TASK_REFRESH_GROUP_INFO, TASK_SYNC_BLOCKLIST};
use crate::app::AppState;
use crate::db::DueTask;
use crate::events::{Event, EventKind};
use crate::telegram::TgError;
use crate::telegram::types::STATUS_CREATOR;
use crate::{Error, Result};

/// Pause between per-group Telegram calls during a refresh sweep
const REFRESH_PACING: StdDuration = StdDuration::from_millis(300);

/// Execute one claimed task
///
/// # Errors
///
/// Returns error for unknown task names or unrecoverable store failures
pub async fn run(state: &Arc<AppState>, task: &DueTask) -> Result<()> {
    match task.name.as_str() {
        TASK_DELETE_MESSAGE => delete_message(state, task).await,
        TASK_REFRESH_GROUP_INFO => refresh_group_info(state).await,
        TASK_SYNC_BLOCKLIST => sync_external_blocklist(state).await,
        other => Err(Error::Task(format!("unknown task name {other}"))),
    }
}

/// Delete a message; repeated runs and already-deleted messages are no-ops
async fn delete_message(state: &Arc<AppState>, task: &DueTask) -> Result<()> {
    let chat_id = task.payload["chat_id"].as_i64();
    let message_id = task.payload["message_id"].as_i64();
    let (Some(chat_id), Some(message_id)) = (chat_id, message_id) else {
        tracing::warn!(payload = %task.payload, "malformed delete_message payload, dropping");
        return Ok(());
    };

    let Some(group) = state.groups().get(chat_id)? else {
        tracing::debug!(chat_id, "delete_message for unmanaged chat, dropping");
        return Ok(());
    };
    let bot = state.api_for_group(&group).await?;

    match bot.api.delete_message(chat_id, message_id).await {
        Ok(()) | Err(TgError::MessageNotFound) => Ok(()),
        Err(TgError::RetryAfter(seconds)) => {
            // Hand the wait back to the queue instead of sleeping here
            super::schedule_message_deletion_after(
                state,
                chat_id,
                message_id,
                seconds.cast_signed(),
            )?;
            Ok(())
        }
        Err(e) => {
            tracing::warn!(chat_id, message_id, error = %e, "scheduled deletion failed");
            Ok(())
        }
    }
}

/// Refresh title, links, owner and admin roster of every managed group
async fn refresh_group_info(state: &Arc<AppState>) -> Result<()> {
    let groups = state.groups().list()?;
    tracing::info!(count = groups.len(), "refreshing group metadata");

    for group in groups {
        let Ok(bot) = state.api_for_group(&group).await else {
            continue;
        };

        let chat = match with_backoff(|| bot.api.get_chat(group.id)).await {
            Ok(chat) => chat,
            Err(TgError::Unauthorized) => {
                tracing::debug!(group_id = group.id, "bot unauthorized, skipping group");
                continue;
            }
            Err(e) => {
                tracing::warn!(group_id = group.id, error = %e, "getChat failed");
                continue;
            }
        };

        let administrators = match with_backoff(|| bot.api.get_chat_administrators(group.id)).await
        {
            Ok(administrators) => administrators,
            Err(e) => {
                tracing::warn!(group_id = group.id, error = %e, "getChatAdministrators failed");
                continue;
            }
        };

        let mut owner_id = None;
        let users = state.users();
        let memberships = state.memberships();
        for member in &administrators {
            let user = users.upsert_seen(&member.user, Utc::now())?;
            if member.status == STATUS_CREATOR {
                owner_id = Some(user.id);
            }
            memberships.set_status(user.id, group.id, &member.status, Utc::now())?;
        }

        state.groups().refresh_info(
            group.id,
            chat.title.as_deref().unwrap_or(&group.title),
            chat.description.as_deref(),
            chat.invite_link.as_deref(),
            owner_id,
        )?;

        tokio::time::sleep(REFRESH_PACING).await;
    }

    Ok(())
}

/// Honor one advertised rate-limit interval, then retry
async fn with_backoff<T, F, Fut>(op: F) -> std::result::Result<T, TgError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, TgError>>,
{
    match op().await {
        Err(TgError::RetryAfter(seconds)) => {
            tracing::debug!(seconds, "rate limited during refresh, backing off");
            tokio::time::sleep(StdDuration::from_secs(seconds)).await;
            op().await
        }
        other => other,
    }
}

/// Replace the external-feed blocklist partition and propagate bans
async fn sync_external_blocklist(state: &Arc<AppState>) -> Result<()> {
    let Some(url) = state.config.external_blocklist_url.clone() else {
        return Ok(());
    };

    let body = reqwest::get(&url).await?.text().await?;
    let Some(user_ids) = parse_blocklist(&body) else {
        tracing::warn!(url, "unparsable blocklist payload, keeping previous partition");
        return Ok(());
    };

    let newly_banned = state.blacklist().replace_external_feed(&user_ids)?;
    tracing::info!(
        total = user_ids.len(),
        newly_banned = newly_banned.len(),
        "external blocklist synchronized"
    );

    let users = state.users();
    for user_id in newly_banned {
        if let Some(user) = users.get(user_id)? {
            let event = Event {
                target: Some((&user).into()),
                ..Event::of(EventKind::ModerationSuperban)
            };
            state.logger.log(&event).await?;
        }
    }
    Ok(())
}

/// Parse a blocklist body: a JSON array of numeric or stringified user ids
fn parse_blocklist(body: &str) -> Option<Vec<u64>> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let entries = value.as_array()?;
    let mut ids = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(id) = entry.as_u64() {
            ids.push(id);
        } else if let Some(id) = entry.as_str().and_then(|s| s.parse().ok()) {
            ids.push(id);
        }
    }
    Some(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocklist_accepts_numbers_and_strings() {
        let ids = parse_blocklist(r#"[1, "2", 3, "junk"]"#).unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn blocklist_rejects_non_arrays() {
        assert!(parse_blocklist(r#"{"ids": [1]}"#).is_none());
        assert!(parse_blocklist("not json").is_none());
    }
}
