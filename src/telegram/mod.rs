//! Telegram Bot API client
//!
//! One [`BotApi`] instance per bot token. All outbound traffic goes through
//! [`BotApi::call`], which decodes the response envelope and classifies
//! failures so callers can react to rate limits and permission problems
//! without string-matching.

pub mod api;
pub mod html;
pub mod retry;
pub mod types;

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use self::types::{API_BASE, TgResponse};

pub use self::retry::retry_once;

/// Classified Bot API failure
#[derive(Debug, Error)]
pub enum TgError {
    /// Rate limited; retry after the advertised number of seconds
    #[error("rate limited, retry after {0}s")]
    RetryAfter(u64),

    /// The chat does not exist or the bot cannot see it
    #[error("chat not found")]
    ChatNotFound,

    /// The bot lacks the rights to perform the action
    #[error("not enough rights")]
    NotEnoughRights,

    /// The bot was removed from the chat or the token was revoked
    #[error("unauthorized")]
    Unauthorized,

    /// The message is already gone
    #[error("message not found")]
    MessageNotFound,

    /// Any other API-level rejection
    #[error("telegram api error: {0}")]
    Api(String),

    /// Transport-level failure
    #[error("telegram transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl TgError {
    /// Classify a failed response envelope
    fn classify(description: Option<String>, retry_after: Option<u64>) -> Self {
        if let Some(seconds) = retry_after {
            return Self::RetryAfter(seconds);
        }
        let description = description.unwrap_or_default();
        let lower = description.to_lowercase();
        if lower.contains("chat not found") {
            Self::ChatNotFound
        } else if lower.contains("not enough rights") {
            Self::NotEnoughRights
        } else if lower.contains("unauthorized") {
            Self::Unauthorized
        } else if lower.contains("message to delete not found")
            || lower.contains("message to forward not found")
        {
            Self::MessageNotFound
        } else {
            Self::Api(description)
        }
    }
}

/// Client for one bot token
#[derive(Clone)]
pub struct BotApi {
    token: String,
    base: String,
    client: Client,
}

impl fmt::Debug for BotApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotApi")
            .field("bot_id", &self.bot_user_id())
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl BotApi {
    /// Create a client against the production Bot API
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base(token, API_BASE)
    }

    /// Create a client against a custom base URL
    #[must_use]
    pub fn with_base(token: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base: base.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    /// The bot's own user id, encoded as the numeric token prefix
    #[must_use]
    pub fn bot_user_id(&self) -> Option<u64> {
        self.token.split(':').next()?.parse().ok()
    }

    /// Invoke a Bot API method
    ///
    /// # Errors
    ///
    /// Returns a classified [`TgError`] on transport failure or when the
    /// envelope reports `ok: false`
    pub async fn call<P, R>(&self, method: &str, payload: &P) -> Result<R, TgError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/bot{}/{}", self.base, self.token, method);
        let response = self.client.post(&url).json(payload).send().await?;
        let body = response.text().await?;

        let envelope: TgResponse<R> = serde_json::from_str(&body)
            .map_err(|e| TgError::Api(format!("bad response for {method}: {e}")))?;

        if envelope.ok {
            if let Some(result) = envelope.result {
                return Ok(result);
            }
        }
        let retry_after = envelope.parameters.and_then(|p| p.retry_after);
        Err(TgError::classify(envelope.description, retry_after))
    }
}
