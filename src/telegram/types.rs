//! Telegram Bot API wire types
//!
//! Only the subset of the Update schema the gateway consumes, plus the
//! request payloads for the outbound methods it calls.

use serde::{Deserialize, Serialize};

/// Base URL for Bot API methods (`{base}/bot{token}/{method}`)
pub const API_BASE: &str = "https://api.telegram.org";

/// Chat member statuses as reported by Telegram
pub const STATUS_CREATOR: &str = "creator";
pub const STATUS_ADMINISTRATOR: &str = "administrator";
pub const STATUS_MEMBER: &str = "member";
pub const STATUS_RESTRICTED: &str = "restricted";
pub const STATUS_LEFT: &str = "left";
pub const STATUS_KICKED: &str = "kicked";

/// An incoming update
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub edited_message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default)]
    pub chat_member: Option<ChatMemberUpdated>,
    #[serde(default)]
    pub chat_join_request: Option<ChatJoinRequest>,
}

impl Update {
    /// The message payload, whether fresh or edited
    #[must_use]
    pub fn any_message(&self) -> Option<&Message> {
        self.message.as_ref().or(self.edited_message.as_ref())
    }
}

/// A Telegram user or bot
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TgUser {
    pub id: u64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

/// A chat (group, supergroup, private or channel)
#[derive(Debug, Clone, Deserialize)]
pub struct TgChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub invite_link: Option<String>,
}

impl TgChat {
    /// Whether this chat is a group or supergroup
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.kind == "group" || self.kind == "supergroup"
    }

    /// Whether this is a one-to-one chat with the bot
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }
}

/// A message
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<TgUser>,
    pub chat: TgChat,
    /// Unix timestamp of the message
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
    #[serde(default)]
    pub reply_to_message: Option<Box<Message>>,
    #[serde(default)]
    pub new_chat_members: Vec<TgUser>,
    #[serde(default)]
    pub left_chat_member: Option<TgUser>,
}

impl Message {
    /// Whether this is a membership service message (joined/left banner)
    #[must_use]
    pub fn is_membership_service(&self) -> bool {
        !self.new_chat_members.is_empty() || self.left_chat_member.is_some()
    }

    /// Entities of the given type together with the text they cover
    #[must_use]
    pub fn entities_of(&self, kind: &str) -> Vec<(&MessageEntity, String)> {
        let Some(text) = self.text.as_deref() else {
            return Vec::new();
        };
        self.entities
            .iter()
            .filter(|e| e.kind == kind)
            .filter_map(|e| entity_text(text, e).map(|t| (e, t)))
            .collect()
    }
}

/// A message entity (mention, command, url, ...)
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    /// Offset in UTF-16 code units
    pub offset: usize,
    /// Length in UTF-16 code units
    pub length: usize,
    /// Populated for `text_mention` entities
    #[serde(default)]
    pub user: Option<TgUser>,
}

/// Extract the text covered by an entity
///
/// Entity offsets are expressed in UTF-16 code units, so the text is
/// re-encoded before slicing.
#[must_use]
pub fn entity_text(text: &str, entity: &MessageEntity) -> Option<String> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let end = entity.offset.checked_add(entity.length)?;
    if end > units.len() {
        return None;
    }
    String::from_utf16(&units[entity.offset..end]).ok()
}

/// An inline keyboard button press
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: TgUser,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// A chat member with its status
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub status: String,
    pub user: TgUser,
    #[serde(default)]
    pub custom_title: Option<String>,
}

/// A `chat_member` status transition
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMemberUpdated {
    pub chat: TgChat,
    pub from: TgUser,
    pub old_chat_member: ChatMember,
    pub new_chat_member: ChatMember,
}

/// A pending request to join a chat via invite link
#[derive(Debug, Clone, Deserialize)]
pub struct ChatJoinRequest {
    pub chat: TgChat,
    pub from: TgUser,
}

/// Chat permissions mask for `restrictChatMember`
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ChatPermissions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_send_messages: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_send_media_messages: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_send_polls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_send_other_messages: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_add_web_page_previews: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_change_info: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_invite_users: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_pin_messages: Option<bool>,
}

impl ChatPermissions {
    /// Everything off except what is explicitly granted later
    #[must_use]
    pub fn muted() -> Self {
        Self {
            can_send_messages: Some(false),
            ..Self::default()
        }
    }

    /// The full send suite restored after an unban
    #[must_use]
    pub fn send_suite() -> Self {
        Self {
            can_send_messages: Some(true),
            can_send_media_messages: Some(true),
            can_send_polls: Some(true),
            can_send_other_messages: Some(true),
            can_add_web_page_previews: Some(true),
            ..Self::default()
        }
    }
}

/// Administrator rights mask for `promoteChatMember`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdminRights {
    pub can_change_info: bool,
    pub can_invite_users: bool,
    pub can_pin_messages: bool,
    pub can_manage_chat: bool,
    pub can_delete_messages: bool,
    pub can_manage_voice_chats: bool,
    pub can_restrict_members: bool,
    pub can_promote_members: bool,
}

impl AdminRights {
    /// Every right granted
    #[must_use]
    pub fn all() -> Self {
        Self {
            can_change_info: true,
            can_invite_users: true,
            can_pin_messages: true,
            can_manage_chat: true,
            can_delete_messages: true,
            can_manage_voice_chats: true,
            can_restrict_members: true,
            can_promote_members: true,
        }
    }

    /// Whether no right is granted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Inline keyboard markup
#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

/// A single inline keyboard button (url or callback variant)
#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

/// Generic Bot API response envelope
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub struct TgResponse<T> {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

/// Extra failure metadata attached by Telegram
#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    #[serde(default)]
    pub retry_after: Option<u64>,
}

/// Result payload of `sendMessage` and `forwardMessage`
#[derive(Debug, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

// --- Outbound request payloads ---------------------------------------------

#[derive(Debug, Serialize)]
pub struct SendMessageRequest {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_web_page_preview: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl SendMessageRequest {
    /// An HTML message without previews, the gateway's default shape
    #[must_use]
    pub fn html(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            parse_mode: Some("HTML"),
            reply_to_message_id: None,
            disable_web_page_preview: Some(true),
            reply_markup: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EditMessageTextRequest {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
pub struct DeleteMessageRequest {
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ForwardMessageRequest {
    pub chat_id: i64,
    pub from_chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Serialize)]
pub struct BanChatMemberRequest {
    pub chat_id: i64,
    pub user_id: u64,
}

#[derive(Debug, Serialize)]
pub struct UnbanChatMemberRequest {
    pub chat_id: i64,
    pub user_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_if_banned: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RestrictChatMemberRequest {
    pub chat_id: i64,
    pub user_id: u64,
    pub permissions: ChatPermissions,
    /// Unix timestamp; absent means forever
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until_date: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PromoteChatMemberRequest {
    pub chat_id: i64,
    pub user_id: u64,
    #[serde(flatten)]
    pub rights: AdminRights,
}

#[derive(Debug, Serialize)]
pub struct SetCustomTitleRequest {
    pub chat_id: i64,
    pub user_id: u64,
    pub custom_title: String,
}

#[derive(Debug, Serialize)]
pub struct ChatIdRequest {
    pub chat_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ApproveChatJoinRequest {
    pub chat_id: i64,
    pub user_id: u64,
}

#[derive(Debug, Serialize)]
pub struct AnswerCallbackQueryRequest {
    pub callback_query_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}
