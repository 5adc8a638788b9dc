//! Method wrappers over [`BotApi::call`]

use super::types::*;
use super::{BotApi, TgError};

impl BotApi {
    /// Send a message and return the sent message id
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the request
    pub async fn send_message(&self, request: &SendMessageRequest) -> Result<i64, TgError> {
        let sent: SentMessage = self.call("sendMessage", request).await?;
        tracing::debug!(chat_id = request.chat_id, "message sent");
        Ok(sent.message_id)
    }

    /// Edit a previously sent message's text
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the request
    pub async fn edit_message_text(&self, request: &EditMessageTextRequest) -> Result<(), TgError> {
        match self
            .call::<_, serde_json::Value>("editMessageText", request)
            .await
        {
            Ok(_) => Ok(()),
            // Re-editing with identical text is not a failure worth surfacing
            Err(TgError::Api(desc)) if desc.to_lowercase().contains("message is not modified") => {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Delete a message
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the request
    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), TgError> {
        self.call::<_, bool>("deleteMessage", &DeleteMessageRequest {
            chat_id,
            message_id,
        })
        .await?;
        Ok(())
    }

    /// Forward a message into another chat, returning the new message id
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the request
    pub async fn forward_message(
        &self,
        chat_id: i64,
        from_chat_id: i64,
        message_id: i64,
    ) -> Result<i64, TgError> {
        let sent: SentMessage = self
            .call("forwardMessage", &ForwardMessageRequest {
                chat_id,
                from_chat_id,
                message_id,
            })
            .await?;
        Ok(sent.message_id)
    }

    /// Ban a user from a chat
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the request
    pub async fn ban_chat_member(&self, chat_id: i64, user_id: u64) -> Result<(), TgError> {
        self.call::<_, bool>("banChatMember", &BanChatMemberRequest { chat_id, user_id })
            .await?;
        tracing::debug!(chat_id, user_id, "member banned");
        Ok(())
    }

    /// Unban a user; with `only_if_banned` this is a no-op for free members
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the request
    pub async fn unban_chat_member(
        &self,
        chat_id: i64,
        user_id: u64,
        only_if_banned: bool,
    ) -> Result<(), TgError> {
        self.call::<_, bool>("unbanChatMember", &UnbanChatMemberRequest {
            chat_id,
            user_id,
            only_if_banned: only_if_banned.then_some(true),
        })
        .await?;
        Ok(())
    }

    /// Apply a permission mask to a member, optionally until a deadline
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the request
    pub async fn restrict_chat_member(
        &self,
        chat_id: i64,
        user_id: u64,
        permissions: ChatPermissions,
        until_date: Option<i64>,
    ) -> Result<(), TgError> {
        self.call::<_, bool>("restrictChatMember", &RestrictChatMemberRequest {
            chat_id,
            user_id,
            permissions,
            until_date,
        })
        .await?;
        Ok(())
    }

    /// Promote (or, with an empty mask, demote) a member
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the request
    pub async fn promote_chat_member(
        &self,
        chat_id: i64,
        user_id: u64,
        rights: AdminRights,
    ) -> Result<(), TgError> {
        self.call::<_, bool>("promoteChatMember", &PromoteChatMemberRequest {
            chat_id,
            user_id,
            rights,
        })
        .await?;
        Ok(())
    }

    /// Set the administrator title shown next to a member's name
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the request
    pub async fn set_chat_administrator_custom_title(
        &self,
        chat_id: i64,
        user_id: u64,
        custom_title: &str,
    ) -> Result<(), TgError> {
        self.call::<_, bool>(
            "setChatAdministratorCustomTitle",
            &SetCustomTitleRequest {
                chat_id,
                user_id,
                custom_title: custom_title.to_string(),
            },
        )
        .await?;
        Ok(())
    }

    /// Fetch current chat metadata
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the request
    pub async fn get_chat(&self, chat_id: i64) -> Result<TgChat, TgError> {
        self.call("getChat", &ChatIdRequest { chat_id }).await
    }

    /// Fetch the administrator roster of a chat
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the request
    pub async fn get_chat_administrators(&self, chat_id: i64) -> Result<Vec<ChatMember>, TgError> {
        self.call("getChatAdministrators", &ChatIdRequest { chat_id })
            .await
    }

    /// Number of members in a chat
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the request
    pub async fn get_chat_member_count(&self, chat_id: i64) -> Result<u64, TgError> {
        self.call("getChatMemberCount", &ChatIdRequest { chat_id })
            .await
    }

    /// Leave a chat
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the request
    pub async fn leave_chat(&self, chat_id: i64) -> Result<(), TgError> {
        self.call::<_, bool>("leaveChat", &ChatIdRequest { chat_id })
            .await?;
        Ok(())
    }

    /// Approve a pending join request
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the request
    pub async fn approve_chat_join_request(
        &self,
        chat_id: i64,
        user_id: u64,
    ) -> Result<(), TgError> {
        self.call::<_, bool>("approveChatJoinRequest", &ApproveChatJoinRequest {
            chat_id,
            user_id,
        })
        .await?;
        Ok(())
    }

    /// Dismiss the loading spinner of an inline keyboard press
    ///
    /// # Errors
    ///
    /// Returns error if the API rejects the request
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<(), TgError> {
        self.call::<_, bool>("answerCallbackQuery", &AnswerCallbackQueryRequest {
            callback_query_id: callback_query_id.to_string(),
            text: text.map(String::from),
        })
        .await?;
        Ok(())
    }
}
