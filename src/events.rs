//! Event kinds, audit-chat formatting and the event logger
//!
//! Every state change funnels through [`EventLogger::log`]: the event is
//! appended to the store first, then rendered and sent to the audit chat by
//! the dedicated logging bot. Destructive actions use the two-phase
//! [`EventLogger::prepare`] / [`EventLogger::log_prepared`] protocol so the
//! evidence survives the action that destroys it.

use chrono::{DateTime, Utc};

use crate::db::{DbPool, EventRepo, GroupRow, NewEvent, UserRow};
use crate::telegram::types::{EditMessageTextRequest, SendMessageRequest, TgChat, TgUser};
use crate::telegram::{BotApi, retry_once};
use crate::{Result, telegram::html};

/// Stable event identifiers, persisted as integers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ChatDoesNotExist,
    ModerationWarn,
    ModerationKick,
    ModerationBan,
    ModerationMute,
    ModerationInfo,
    ModerationFree,
    ModerationSuperban,
    UserJoined,
    UserLeft,
    NotEnoughRights,
    ModerationSuperfree,
    TelegramError,
    UserCalledAdmin,
    ModerationDel,
    WhitelistBot,
    Broadcast,
}

impl EventKind {
    /// Stable integer code used in the store
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::ChatDoesNotExist => 0,
            Self::ModerationWarn => 1,
            Self::ModerationKick => 2,
            Self::ModerationBan => 3,
            Self::ModerationMute => 4,
            Self::ModerationInfo => 5,
            Self::ModerationFree => 6,
            Self::ModerationSuperban => 7,
            Self::UserJoined => 8,
            Self::UserLeft => 9,
            Self::NotEnoughRights => 10,
            Self::ModerationSuperfree => 11,
            Self::TelegramError => 12,
            Self::UserCalledAdmin => 13,
            Self::ModerationDel => 14,
            Self::WhitelistBot => 15,
            Self::Broadcast => 16,
        }
    }

    /// Hash-tag name shown in the audit chat
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::ChatDoesNotExist => "CHAT_DOES_NOT_EXIST",
            Self::ModerationWarn => "MODERATION_WARN",
            Self::ModerationKick => "MODERATION_KICK",
            Self::ModerationBan => "MODERATION_BAN",
            Self::ModerationMute => "MODERATION_MUTE",
            Self::ModerationInfo => "MODERATION_INFO",
            Self::ModerationFree => "MODERATION_FREE",
            Self::ModerationSuperban => "MODERATION_SUPERBAN",
            Self::UserJoined => "USER_JOINED",
            Self::UserLeft => "USER_LEFT",
            Self::NotEnoughRights => "NOT_ENOUGH_RIGHTS",
            Self::ModerationSuperfree => "MODERATION_SUPERFREE",
            Self::TelegramError => "TELEGRAM_ERROR",
            Self::UserCalledAdmin => "USER_CALLED_ADMIN",
            Self::ModerationDel => "MODERATION_DEL",
            Self::WhitelistBot => "WHITELIST_BOT",
            Self::Broadcast => "BROADCAST",
        }
    }

    /// Pictogram prefixed to the audit line
    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::ChatDoesNotExist | Self::TelegramError => "\u{2757}\u{fe0f}",
            Self::ModerationWarn => "\u{1f7e1}",
            Self::ModerationKick | Self::WhitelistBot => "\u{26aa}",
            Self::ModerationBan => "\u{1f534}",
            Self::ModerationMute => "\u{1f7e0}",
            Self::ModerationInfo => "\u{2139}\u{fe0f}",
            Self::ModerationFree => "\u{1f7e2}",
            Self::ModerationSuperban => "\u{26ab}\u{fe0f}",
            Self::UserJoined => "\u{2795}",
            Self::UserLeft => "\u{2796}",
            Self::NotEnoughRights => "\u{1f530}",
            Self::ModerationSuperfree => "\u{2733}\u{fe0f}",
            Self::UserCalledAdmin => "\u{1f9d1}\u{200d}\u{2696}\u{fe0f}",
            Self::ModerationDel => "\u{270f}\u{fe0f}",
            Self::Broadcast => "\u{1f4e1}",
        }
    }

    /// Whether the audit line carries issuer details
    #[must_use]
    pub const fn shows_issuer(self) -> bool {
        matches!(
            self,
            Self::ModerationWarn
                | Self::ModerationKick
                | Self::ModerationBan
                | Self::ModerationMute
                | Self::ModerationFree
                | Self::ModerationSuperban
                | Self::ModerationSuperfree
                | Self::ModerationDel
                | Self::WhitelistBot
                | Self::UserCalledAdmin
                | Self::Broadcast
        )
    }
}

/// Minimal chat details an event needs
#[derive(Debug, Clone)]
pub struct ChatRef {
    pub id: i64,
    pub title: String,
}

impl From<&GroupRow> for ChatRef {
    fn from(group: &GroupRow) -> Self {
        Self {
            id: group.id,
            title: group.title.clone(),
        }
    }
}

impl From<&TgChat> for ChatRef {
    fn from(chat: &TgChat) -> Self {
        Self {
            id: chat.id,
            title: chat.title.clone().unwrap_or_default(),
        }
    }
}

/// Minimal user details an event needs
#[derive(Debug, Clone)]
pub struct ActorRef {
    pub id: u64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl From<&UserRow> for ActorRef {
    fn from(user: &UserRow) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
        }
    }
}

impl From<&TgUser> for ActorRef {
    fn from(user: &TgUser) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
        }
    }
}

/// Source message referenced as evidence
#[derive(Debug, Clone, Copy)]
pub struct EvidenceRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// An event about to be recorded
#[derive(Debug, Clone, Default)]
pub struct Event {
    pub kind: Option<EventKind>,
    pub chat: Option<ChatRef>,
    pub target: Option<ActorRef>,
    pub issuer: Option<ActorRef>,
    pub reason: Option<String>,
    pub message_text: Option<String>,
    pub message_deleted: bool,
    pub until: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub evidence: Option<EvidenceRef>,
}

impl Event {
    /// Shorthand for the common (kind, chat) shape
    #[must_use]
    pub fn of(kind: EventKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }
}

/// Group tag normalized for the audit chat, e.g. `#gid_100500`
#[must_use]
pub fn normalize_group_id(group_id: i64) -> String {
    format!("#gid_{}", group_id.unsigned_abs())
}

/// User tag normalized for the audit chat, e.g. `#uid_42`
#[must_use]
pub fn normalize_user_id(user_id: u64) -> String {
    format!("#uid_{user_id}")
}

fn format_chat(chat: &ChatRef) -> String {
    format!("{} {}", html::escape(&chat.title), normalize_group_id(chat.id))
}

fn format_actor(actor: &ActorRef) -> String {
    let mut text = html::escape(&actor.first_name);
    if let Some(last) = &actor.last_name {
        text.push(' ');
        text.push_str(&html::escape(last));
    }
    if let Some(username) = &actor.username {
        let at = if username.starts_with('@') { "" } else { "@" };
        text.push_str(&format!(" [{at}{}]", html::escape(username)));
    }
    format!("{text} {}", normalize_user_id(actor.id))
}

/// Render the audit-chat text for an event
#[must_use]
pub fn render(event: &Event) -> String {
    let kind = event.kind.unwrap_or(EventKind::TelegramError);
    let star = if event.message_deleted { "*" } else { "" };
    let mut text = format!("{} #{}{}", kind.emoji(), kind.tag(), star);

    if let Some(chat) = &event.chat {
        text.push_str(&format!("\n\u{1f465} <b>Group</b>: {}", format_chat(chat)));
    }
    if let Some(target) = &event.target {
        text.push_str(&format!(
            "\n\u{1f464} <b>Target user</b>: {}",
            format_actor(target)
        ));
    }
    if kind.shows_issuer() {
        if let Some(issuer) = &event.issuer {
            text.push_str(&format!(
                "\n\u{1f46e} <b>Issuer</b>: {}",
                format_actor(issuer)
            ));
        }
    }
    if let Some(until) = event.until {
        text.push_str(&format!(
            "\n\u{23f3} <b>Until date</b>: {}",
            until.format("%d/%m/%Y %H:%M")
        ));
    }
    if let Some(error) = &event.error_message {
        text.push_str(&format!(
            "\n\u{1f4ac} <b>Error message</b>: {}",
            html::escape(error)
        ));
    }
    if let Some(reason) = &event.reason {
        text.push_str(&format!("\n\u{1f4ac} <b>Reason</b>: {}", html::escape(reason)));
    }
    if event.evidence.is_some() {
        text.push_str("\n\u{1f4dc} <b>Message</b>: <i>see below</i>");
    }
    text
}

/// A reserved audit-chat slot for an action that destroys its evidence
#[derive(Debug, Clone, Copy)]
pub struct PreparedEntry {
    pub audit_message_id: i64,
}

/// Durable event record plus audit-chat notifications
#[derive(Clone)]
pub struct EventLogger {
    repo: EventRepo,
    api: BotApi,
    chat_id: i64,
}

impl EventLogger {
    /// Create a logger over the store and the dedicated logging bot
    #[must_use]
    pub fn new(pool: DbPool, api: BotApi, chat_id: i64) -> Self {
        Self {
            repo: EventRepo::new(pool),
            api,
            chat_id,
        }
    }

    /// Reserve an audit message and forward the evidence next to it
    ///
    /// # Errors
    ///
    /// Returns error if the placeholder cannot be sent
    pub async fn prepare(&self, evidence: Option<EvidenceRef>) -> Result<PreparedEntry> {
        let placeholder = SendMessageRequest::html(self.chat_id, "\u{2026}");
        let audit_message_id =
            retry_once(|| self.api.send_message(&placeholder)).await?;

        if let Some(evidence) = evidence {
            if let Err(e) = self
                .api
                .forward_message(self.chat_id, evidence.chat_id, evidence.message_id)
                .await
            {
                tracing::warn!(error = %e, "could not forward evidence message");
            }
        }
        Ok(PreparedEntry { audit_message_id })
    }

    /// Record an event and notify the audit chat
    ///
    /// The store write always happens; a failing audit-chat send is logged
    /// and swallowed so moderation never stalls on notification delivery.
    ///
    /// # Errors
    ///
    /// Returns error if the store write fails
    pub async fn log(&self, event: &Event) -> Result<i64> {
        let event_id = self.persist(event, None)?;
        let text = render(event);

        let request = SendMessageRequest::html(self.chat_id, text);
        match retry_once(|| self.api.send_message(&request)).await {
            Ok(_) => {
                if let Some(evidence) = event.evidence {
                    if let Err(e) = self
                        .api
                        .forward_message(self.chat_id, evidence.chat_id, evidence.message_id)
                        .await
                    {
                        tracing::warn!(error = %e, "could not forward evidence message");
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, kind = ?event.kind, "audit notification failed"),
        }
        Ok(event_id)
    }

    /// Record an event into a previously reserved audit slot
    ///
    /// # Errors
    ///
    /// Returns error if the store write fails
    pub async fn log_prepared(&self, prepared: PreparedEntry, event: &Event) -> Result<i64> {
        let event_id = self.persist(event, Some(prepared.audit_message_id))?;
        let request = EditMessageTextRequest {
            chat_id: self.chat_id,
            message_id: prepared.audit_message_id,
            text: render(event),
            parse_mode: Some("HTML"),
            reply_markup: None,
        };
        if let Err(e) = retry_once(|| self.api.edit_message_text(&request)).await {
            tracing::warn!(error = %e, "audit placeholder edit failed");
        }
        Ok(event_id)
    }

    fn persist(&self, event: &Event, audit_message_id: Option<i64>) -> Result<i64> {
        let reason = event
            .reason
            .clone()
            .or_else(|| event.error_message.clone());
        self.repo.append(
            &NewEvent {
                kind: event.kind,
                chat_id: event.chat.as_ref().map(|c| c.id),
                target_id: event.target.as_ref().map(|t| t.id),
                issuer_id: event.issuer.as_ref().map(|i| i.id),
                reason,
                message_text: event.message_text.clone(),
                message_deleted: event.message_text.as_ref().map(|_| event.message_deleted),
                audit_message_id,
            },
            Utc::now(),
        )
    }
}
