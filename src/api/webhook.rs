//! Webhook ingress
//!
//! One endpoint for every registered bot; the secret token in the query
//! string picks the bot. The update is processed to completion before the
//! response is sent, and handler failures never surface as HTTP errors.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::dispatch::{self, UpdateCtx};
use crate::telegram::types::Update;

/// Query parameters of the webhook endpoint
#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Webhook response body
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl WebhookResponse {
    const fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    const fn error(message: &'static str) -> Self {
        Self {
            ok: false,
            error: Some(message),
        }
    }
}

/// Handle `POST /webhook?token=<T>`
pub async fn handle(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WebhookQuery>,
    body: String,
) -> (StatusCode, Json<WebhookResponse>) {
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(WebhookResponse::error("missing token")),
        );
    };

    let bot = match state.bot_by_token(&token).await {
        Ok(Some(bot)) => bot,
        Ok(None) => {
            tracing::warn!("webhook call with unregistered token");
            return (
                StatusCode::FORBIDDEN,
                Json(WebhookResponse::error("unknown bot token")),
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "bot authentication failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookResponse::error("authentication unavailable")),
            );
        }
    };

    // A body Telegram cannot have sent: ignore, but acknowledge so the
    // gateway is not hammered with retries
    let update: Update = match serde_json::from_str(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, "undecodable update body ignored");
            return (StatusCode::OK, Json(WebhookResponse::ok()));
        }
    };

    tracing::debug!(
        update_id = update.update_id,
        bot = %bot.row.username,
        "processing update"
    );

    let ctx = UpdateCtx { state, bot };
    dispatch::dispatch(&ctx, &update).await;

    (StatusCode::OK, Json(WebhookResponse::ok()))
}
