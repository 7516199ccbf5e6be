//! Message router: the core orchestrator.
//!
//! Validates sender registration, persists messages before any broadcast,
//! keeps conversation metadata current, fans out to the live sessions of a
//! conversation, and notifies a receiver who is online but elsewhere in the
//! app. Durability precedes visibility: nothing is broadcast until the store
//! has confirmed the write.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::conversation::{conversation_id, ConversationResolver};
use crate::error::ChatError;
use crate::models::{Message, NewMessage};
use crate::protocol::ServerEvent;
use crate::registry::SessionRegistry;
use crate::store::MessageStore;

pub struct MessageRouter {
    registry: Arc<dyn SessionRegistry>,
    store: Arc<dyn MessageStore>,
    resolver: Arc<ConversationResolver>,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        store: Arc<dyn MessageStore>,
        resolver: Arc<ConversationResolver>,
    ) -> Self {
        Self {
            registry,
            store,
            resolver,
        }
    }

    /// Join the session to the conversation with `target_user_id`, creating
    /// the conversation on first reference, and replay its history to the
    /// requesting session only.
    ///
    /// A history load failure is reported to the caller but does not undo
    /// the join; the conversation stays usable for new messages.
    pub async fn start_conversation(
        &self,
        session_id: &str,
        target_user_id: &str,
    ) -> Result<(), ChatError> {
        let session = self
            .registry
            .session(session_id)
            .await
            .ok_or(ChatError::NotRegistered)?;

        let room_id = conversation_id(&session.participant_id, target_user_id);
        self.resolver.ensure(
            &room_id,
            [session.participant_id.clone(), target_user_id.to_string()],
        );
        self.registry.join_room(&room_id, session_id).await;

        self.registry
            .send_to(
                session_id,
                ServerEvent::ConversationStarted {
                    room_id: room_id.clone(),
                },
            )
            .await;

        info!(
            "participant {} joined conversation {}",
            session.participant_id, room_id
        );

        match self.store.find_by_conversation(&room_id).await {
            Ok(messages) => {
                self.registry
                    .send_to(
                        session_id,
                        ServerEvent::MessageHistory {
                            room_id,
                            messages,
                        },
                    )
                    .await;
                Ok(())
            }
            Err(source) => {
                warn!("history load failed for {}: {}", room_id, source);
                Err(ChatError::HistoryLoad { room_id, source })
            }
        }
    }

    /// Persist one message and fan it out.
    ///
    /// Exactly one persistence attempt: on store failure the send is aborted
    /// and nothing is broadcast. On success the stored message (with its
    /// generated id) goes to every live session in the room, and every
    /// receiver session that is online but outside the room gets a
    /// `newConversation` preview instead.
    pub async fn send_message(
        &self,
        session_id: &str,
        room_id: &str,
        content: &str,
        receiver_id: &str,
        message_type: crate::models::MessageType,
    ) -> Result<Message, ChatError> {
        let sender = self
            .registry
            .session(session_id)
            .await
            .ok_or(ChatError::NotRegistered)?;

        if !self.resolver.exists(room_id) {
            return Err(ChatError::ConversationNotFound(room_id.to_string()));
        }

        let stored = self
            .store
            .append(NewMessage {
                room_id: room_id.to_string(),
                sender_id: sender.participant_id.clone(),
                receiver_id: receiver_id.to_string(),
                content: content.to_string(),
                message_type,
                sender_name: sender.display_name.clone(),
                sender_role: sender.role.clone(),
            })
            .await
            .map_err(ChatError::Persistence)?;

        self.resolver.touch(room_id);

        // Fan out to the room. A session vanishing between the membership
        // snapshot and delivery is a no-op.
        for member in self.registry.room_members(room_id).await {
            self.registry
                .send_to(&member, ServerEvent::NewMessage(stored.clone()))
                .await;
        }

        // Receiver online but not viewing the conversation: every such
        // session gets a lightweight preview.
        for receiver_session in self.registry.sessions_for(receiver_id).await {
            if !self.registry.in_room(room_id, &receiver_session).await {
                self.registry
                    .send_to(
                        &receiver_session,
                        ServerEvent::NewConversation {
                            room_id: room_id.to_string(),
                            last_message: stored.content.clone(),
                            sender_id: sender.participant_id.clone(),
                            sender_name: sender.display_name.clone(),
                            sender_role: sender.role.clone(),
                            timestamp: stored.timestamp,
                        },
                    )
                    .await;
            }
        }

        debug!(
            "message {} routed in {} from {} to {}",
            stored.id, room_id, stored.sender_id, stored.receiver_id
        );

        Ok(stored)
    }

    /// Flip the read flag for the given ids and tell the room.
    ///
    /// The `messagesRead` event is only emitted after the store confirms the
    /// update; a failed update must not broadcast a false positive.
    pub async fn mark_as_read(
        &self,
        room_id: &str,
        message_ids: Vec<String>,
    ) -> Result<(), ChatError> {
        if !self.resolver.exists(room_id) {
            return Err(ChatError::ConversationNotFound(room_id.to_string()));
        }

        let flipped = self
            .store
            .mark_read(&message_ids)
            .await
            .map_err(|source| ChatError::MarkRead {
                room_id: room_id.to_string(),
                source,
            })?;
        debug!("marked {} messages read in {}", flipped, room_id);

        for member in self.registry.room_members(room_id).await {
            self.registry
                .send_to(
                    &member,
                    ServerEvent::MessagesRead {
                        room_id: room_id.to_string(),
                        message_ids: message_ids.clone(),
                    },
                )
                .await;
        }

        Ok(())
    }

    /// Ephemeral typing indicator, fanned out to every other session in the
    /// room. Fire-and-forget: no persistence, no error path, and an unknown
    /// session is simply ignored.
    pub async fn typing(&self, session_id: &str, room_id: &str, is_typing: bool) {
        let Some(session) = self.registry.session(session_id).await else {
            return;
        };

        for member in self.registry.room_members(room_id).await {
            if member == session_id {
                continue;
            }
            self.registry
                .send_to(
                    &member,
                    ServerEvent::UserTyping {
                        user_id: session.participant_id.clone(),
                        user_name: session.display_name.clone(),
                        is_typing,
                        room_id: room_id.to_string(),
                    },
                )
                .await;
        }
    }
}
