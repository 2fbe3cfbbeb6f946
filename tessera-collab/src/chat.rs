//! Room chat relay.
//!
//! Sends append to the local message list immediately; the server echo
//! of our own message is ignored so nothing is duplicated. Peer messages
//! bump an unread counter until the UI marks the pane read.

use uuid::Uuid;

use crate::engine::{CollabClient, CollabEvent};
use crate::protocol::{epoch_ms, ChatPayload, MessageType};
use crate::session::{ChatMessage, Session};

impl CollabClient {
    /// Send a chat message, optionally replying to an earlier one.
    ///
    /// Empty and whitespace-only content is rejected. The message is
    /// appended locally before broadcast; no server acknowledgment is
    /// awaited.
    pub async fn send_chat_message(
        &self,
        content: impl Into<String>,
        reply_to: Option<Uuid>,
    ) -> Option<ChatMessage> {
        let content = content.into();
        if content.trim().is_empty() {
            return None;
        }

        let message = {
            let mut s = self.session.write().await;
            let user_id = s.local_user_id()?;
            let room = s.current_room.as_mut()?;
            let message = ChatMessage {
                id: Uuid::new_v4(),
                user_id,
                content,
                timestamp: epoch_ms(),
                reply_to,
                is_system: false,
            };
            room.chat_messages.push(message.clone());
            message
        };

        self.outbound.send(
            MessageType::ChatMessage,
            ChatPayload {
                message: message.clone(),
            },
        );
        Some(message)
    }

    /// Clear the unread counter.
    pub async fn mark_chat_as_read(&self) {
        self.session.write().await.unread_chat_count = 0;
    }

    /// Peer messages received since the chat pane was last read.
    pub async fn unread_chat_count(&self) -> usize {
        self.session.read().await.unread_chat_count
    }

    /// The room's chat history as currently known.
    pub async fn chat_messages(&self) -> Vec<ChatMessage> {
        self.session
            .read()
            .await
            .current_room
            .as_ref()
            .map(|r| r.chat_messages.clone())
            .unwrap_or_default()
    }
}

pub(crate) fn apply_chat_received(s: &mut Session, p: ChatPayload) -> Option<CollabEvent> {
    // Our own messages were appended at send time.
    if s.local_user_id() == Some(p.message.user_id) && !p.message.is_system {
        return None;
    }
    let room = s.current_room.as_mut()?;
    room.chat_messages.push(p.message.clone());
    if !p.message.is_system {
        s.unread_chat_count += 1;
    }
    Some(CollabEvent::ChatReceived(p.message))
}
