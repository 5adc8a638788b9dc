//! Lightweight community commands

use crate::db::respects::RespectsRepo;
use crate::dispatch::{Outcome, UpdateCtx};
use crate::telegram::retry_once;
use crate::telegram::types::{
    CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, Message, SendMessageRequest,
};
use crate::Result;

/// Start a "press F" counter (`/respects`)
///
/// # Errors
///
/// Returns error if a store operation fails
pub async fn handle_respects(ctx: &UpdateCtx, message: &Message) -> Result<Outcome> {
    let mut request = SendMessageRequest::html(message.chat.id, "Press F to pay respects");
    request.reply_markup = Some(InlineKeyboardMarkup {
        inline_keyboard: vec![vec![InlineKeyboardButton {
            text: "F".to_string(),
            url: None,
            callback_data: Some("press_f".to_string()),
        }]],
    });

    match retry_once(|| ctx.api().send_message(&request)).await {
        Ok(message_id) => {
            RespectsRepo::new(ctx.state.db.clone()).create(message.chat.id, message_id)?;
        }
        Err(e) => tracing::warn!(chat_id = message.chat.id, error = %e, "respects send failed"),
    }
    Ok(Outcome::Stop)
}

/// Count an F press and refresh the tally
///
/// # Errors
///
/// Returns error if a store operation fails
pub async fn handle_press_f(ctx: &UpdateCtx, callback: &CallbackQuery) -> Result<Outcome> {
    if let Err(e) = ctx.api().answer_callback_query(&callback.id, None).await {
        tracing::debug!(error = %e, "callback answer failed");
    }

    let Some(message) = &callback.message else {
        return Ok(Outcome::Stop);
    };

    let repo = RespectsRepo::new(ctx.state.db.clone());
    let Some(count) = repo.bump(message.chat.id, message.message_id)? else {
        return Ok(Outcome::Stop);
    };

    let text = format!("\u{1f56f} {count} have paid their respects");
    let request = crate::telegram::types::EditMessageTextRequest {
        chat_id: message.chat.id,
        message_id: message.message_id,
        text,
        parse_mode: None,
        reply_markup: Some(InlineKeyboardMarkup {
            inline_keyboard: vec![vec![InlineKeyboardButton {
                text: "F".to_string(),
                url: None,
                callback_data: Some("press_f".to_string()),
            }]],
        }),
    };
    if let Err(e) = ctx.api().edit_message_text(&request).await {
        tracing::debug!(error = %e, "respects tally edit failed");
    }
    Ok(Outcome::Stop)
}
