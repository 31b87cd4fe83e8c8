//! Live chat and order-communication service.
//!
//! One support room per user, created lazily by the backend RPC. New
//! messages are never appended optimistically: sending inserts the row
//! and the message arrives back over the room's realtime subscription,
//! so every open tab shows the same order of events.

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use pixelmart_core::{ChatRoomId, OrderId, SenderRole};
use pixelmart_realtime::{RealtimeHub, Subscription, Topic};

use crate::backend::types::{ChatMessage, ChatRoom, NewChatMessage, OrderCommunication};
use crate::backend::{BackendClient, BackendError};
use crate::models::CurrentUser;

/// Errors that can occur in chat operations.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A message needs content or an attachment.
    #[error("message is empty")]
    EmptyMessage,

    /// Backend request failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Chat service.
pub struct ChatService<'a> {
    backend: &'a BackendClient,
    realtime: &'a RealtimeHub,
}

impl<'a> ChatService<'a> {
    /// Create a new chat service.
    #[must_use]
    pub const fn new(backend: &'a BackendClient, realtime: &'a RealtimeHub) -> Self {
        Self { backend, realtime }
    }

    /// Get the user's support room, creating it if this is their first
    /// visit. Idempotent by user on the backend side.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC fails.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn resolve_room(&self, user: &CurrentUser) -> Result<ChatRoom, ChatError> {
        let room = self
            .backend
            .rpc(
                Some(&user.access_token),
                "get_or_create_chat_room",
                serde_json::json!({ "user_id": user.id }),
            )
            .await?;
        Ok(room)
    }

    /// Message history for a room, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails; row-level security already
    /// hides rooms that aren't the user's.
    pub async fn history(
        &self,
        user: &CurrentUser,
        room_id: ChatRoomId,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let messages = self
            .backend
            .from("chat_messages")
            .eq("room_id", room_id)
            .order("created_at.asc")
            .auth(&user.access_token)
            .fetch()
            .await?;
        Ok(messages)
    }

    /// Send a message into a room and touch its last-message timestamp.
    ///
    /// # Errors
    ///
    /// Returns `EmptyMessage` for a blank message with no attachment.
    #[instrument(skip(self, user, content, attachment_url), fields(room_id = %room_id))]
    pub async fn send(
        &self,
        user: &CurrentUser,
        room_id: ChatRoomId,
        content: &str,
        attachment_url: Option<String>,
    ) -> Result<ChatMessage, ChatError> {
        let content = content.trim();
        if content.is_empty() && attachment_url.is_none() {
            return Err(ChatError::EmptyMessage);
        }

        let message: ChatMessage = self
            .backend
            .insert_one(
                Some(&user.access_token),
                "chat_messages",
                &NewChatMessage {
                    room_id,
                    sender_role: SenderRole::Customer,
                    content: content.to_string(),
                    attachment_url,
                },
            )
            .await?;

        self.backend
            .update(
                Some(&user.access_token),
                "chat_rooms",
                &[("id", room_id.to_string())],
                &serde_json::json!({ "last_message_at": Utc::now() }),
            )
            .await?;

        Ok(message)
    }

    /// Upload a chat attachment and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    pub async fn upload_attachment(
        &self,
        user: &CurrentUser,
        room_id: ChatRoomId,
        filename: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ChatError> {
        let path = format!("chat/{room_id}/{}-{}", Uuid::new_v4(), sanitize(filename));
        let url = self
            .backend
            .upload(Some(&user.access_token), &path, bytes, content_type)
            .await?;
        Ok(url)
    }

    /// Subscribe to inserts for one room. Events for other rooms never
    /// reach this subscription; dropping it releases the topic.
    #[must_use]
    pub fn subscribe(&self, room_id: ChatRoomId) -> Subscription {
        self.realtime
            .subscribe(&Topic::filtered("chat_messages", "room_id", room_id))
    }

    // =========================================================================
    // Order communication threads
    // =========================================================================

    /// The message thread attached to one order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails.
    pub async fn order_thread(
        &self,
        user: &CurrentUser,
        order_id: OrderId,
    ) -> Result<Vec<OrderCommunication>, ChatError> {
        let messages = self
            .backend
            .from("order_communications")
            .eq("order_id", order_id)
            .order("created_at.asc")
            .auth(&user.access_token)
            .fetch()
            .await?;
        Ok(messages)
    }

    /// Append a customer message to an order's thread.
    ///
    /// # Errors
    ///
    /// Returns `EmptyMessage` for a blank message with no attachment.
    #[instrument(skip(self, user, content, attachment_url), fields(order_id = %order_id))]
    pub async fn send_order_message(
        &self,
        user: &CurrentUser,
        order_id: OrderId,
        content: &str,
        attachment_url: Option<String>,
    ) -> Result<OrderCommunication, ChatError> {
        let content = content.trim();
        if content.is_empty() && attachment_url.is_none() {
            return Err(ChatError::EmptyMessage);
        }

        let message = self
            .backend
            .insert_one(
                Some(&user.access_token),
                "order_communications",
                &serde_json::json!({
                    "order_id": order_id,
                    "sender_role": SenderRole::Customer,
                    "content": content,
                    "attachment_url": attachment_url,
                }),
            )
            .await?;
        Ok(message)
    }
}

/// Keep attachment names path-safe.
pub(crate) fn sanitize(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_safe_names() {
        assert_eq!(sanitize("receipt-01.png"), "receipt-01.png");
    }

    #[test]
    fn test_sanitize_replaces_path_separators() {
        assert_eq!(sanitize("../../etc/passwd"), ".._.._etc_passwd");
    }
}
