//! Telegram admin-rights reconciliation
//!
//! Applies the resolver's output to Telegram: promote with the effective
//! mask, set the custom title, or demote back to plain member when nothing
//! remains. Role changes fan out across every group the user belongs to.

use std::sync::Arc;

use crate::app::AppState;
use crate::db::{GroupRow, UserRow};
use crate::events::{ChatRef, Event, EventKind};
use crate::perms;
use crate::telegram::TgError;
use crate::Result;

/// Reconcile one user's admin rights in one group
///
/// Without `force`, plain members are left untouched; with it, an empty
/// mask is pushed anyway, which demotes a user whose roles disappeared.
/// Permanent Telegram failures are recorded as events and swallowed so a
/// single hostile group cannot break the fan-out.
///
/// # Errors
///
/// Returns error if a store operation fails
pub async fn apply_admin_rights(
    state: &Arc<AppState>,
    user: &UserRow,
    group: &GroupRow,
    force: bool,
) -> Result<()> {
    let degrees = state.catalog().degrees_for_chat(group.id)?;
    let roles = state.roles().list_for_user(user.id)?;
    let resolved = perms::resolve(&roles, &degrees);

    if resolved.is_plain_member() && !force {
        return Ok(());
    }

    let bot = match state.api_for_group(group).await {
        Ok(bot) => bot,
        Err(e) => {
            tracing::warn!(group_id = group.id, error = %e, "no bot for rights reconciliation");
            return Ok(());
        }
    };

    let rights = resolved.rights;
    let result = async {
        bot.api.promote_chat_member(group.id, user.id, rights).await?;
        if !rights.is_empty() {
            if let Some(title) = &resolved.custom_title {
                bot.api
                    .set_chat_administrator_custom_title(group.id, user.id, title)
                    .await?;
            }
        }
        Ok::<(), TgError>(())
    }
    .await;

    match result {
        Ok(()) => {
            tracing::debug!(
                user_id = user.id,
                group_id = group.id,
                promoted = !rights.is_empty(),
                "admin rights reconciled"
            );
            Ok(())
        }
        Err(TgError::ChatNotFound) => {
            let event = Event {
                chat: Some(ChatRef::from(group)),
                target: Some(user.into()),
                ..Event::of(EventKind::ChatDoesNotExist)
            };
            state.logger.log(&event).await?;
            Ok(())
        }
        Err(TgError::NotEnoughRights) => {
            let event = Event {
                chat: Some(ChatRef::from(group)),
                target: Some(user.into()),
                ..Event::of(EventKind::NotEnoughRights)
            };
            state.logger.log(&event).await?;
            Ok(())
        }
        Err(e) => {
            tracing::warn!(user_id = user.id, group_id = group.id, error = %e, "promotion failed");
            Ok(())
        }
    }
}

/// Re-apply admin rights in every group a user belongs to
///
/// Call after any role create, update or delete. The forced reconciliation
/// demotes users whose resolved set became empty.
///
/// # Errors
///
/// Returns error if a store operation fails
pub async fn role_changed(state: &Arc<AppState>, user_id: u64) -> Result<()> {
    let Some(user) = state.users().get(user_id)? else {
        return Ok(());
    };
    let groups = state.groups();
    for group_id in state.memberships().groups_of(user_id)? {
        if let Some(group) = groups.get(group_id)? {
            apply_admin_rights(state, &user, &group, true).await?;
        }
    }
    Ok(())
}
