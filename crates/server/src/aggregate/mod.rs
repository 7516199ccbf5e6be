//! On-demand conversation summaries.
//!
//! Read-heavy aggregation over the message store: group a participant's
//! messages by conversation, surface the latest message and the unread
//! count, and resolve the other participant's profile. Nothing here is
//! cached, because unread state must always reflect the latest store writes.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::directory::Directory;
use crate::models::{ConversationSummary, Message, UserProfile};
use crate::store::{MessageStore, StoreError};

pub struct ConversationAggregator {
    store: Arc<dyn MessageStore>,
    directory: Arc<dyn Directory>,
}

impl ConversationAggregator {
    pub fn new(store: Arc<dyn MessageStore>, directory: Arc<dyn Directory>) -> Self {
        Self { store, directory }
    }

    /// All conversations the participant is part of, ordered by last-message
    /// timestamp descending. Ties break deterministically by message id.
    pub async fn conversations_for(
        &self,
        participant_id: &str,
    ) -> Result<Vec<ConversationSummary>, StoreError> {
        let messages = self.store.find_for_participant(participant_id).await?;

        // Group by conversation, keeping the newest message per group and
        // counting unread addressed to the requester.
        let mut groups: HashMap<String, (Message, u64)> = HashMap::new();
        for message in messages {
            let unread =
                u64::from(message.receiver_id == participant_id && !message.is_read);
            match groups.get_mut(&message.room_id) {
                Some((last, count)) => {
                    if newer(&message, last) {
                        *last = message;
                    }
                    *count += unread;
                }
                None => {
                    groups.insert(message.room_id.clone(), (message, unread));
                }
            }
        }

        let mut summaries = Vec::with_capacity(groups.len());
        for (room_id, (last_message, unread_count)) in groups {
            let other_user = self
                .resolve_other(participant_id, &last_message)
                .await;
            summaries.push(ConversationSummary {
                room_id,
                last_message,
                unread_count,
                other_user,
            });
        }

        summaries.sort_by(|a, b| {
            b.last_message
                .timestamp
                .cmp(&a.last_message.timestamp)
                .then_with(|| a.last_message.id.cmp(&b.last_message.id))
        });

        Ok(summaries)
    }

    /// Unread messages addressed to the participant across all conversations.
    pub async fn unread_total(&self, participant_id: &str) -> Result<u64, StoreError> {
        self.store.count_unread(participant_id).await
    }

    /// Resolve the other participant via the directory, falling back to the
    /// denormalized sender fields on the last message. Lookup failures are
    /// recovered here and never surfaced to the caller.
    async fn resolve_other(&self, participant_id: &str, last_message: &Message) -> UserProfile {
        let other_id = if last_message.sender_id == participant_id {
            last_message.receiver_id.clone()
        } else {
            last_message.sender_id.clone()
        };

        match self.directory.resolve_profile(&other_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => fallback_profile(other_id, last_message),
            Err(e) => {
                warn!("profile lookup failed for {}: {}", other_id, e);
                fallback_profile(other_id, last_message)
            }
        }
    }
}

fn newer(candidate: &Message, current: &Message) -> bool {
    (candidate.timestamp, candidate.id.as_str()) > (current.timestamp, current.id.as_str())
}

fn fallback_profile(other_id: String, last_message: &Message) -> UserProfile {
    let name = if last_message.sender_name.is_empty() {
        other_id.clone()
    } else {
        last_message.sender_name.clone()
    };
    let role = if last_message.sender_role.is_empty() {
        "Unknown".to_string()
    } else {
        last_message.sender_role.clone()
    };
    UserProfile {
        id: other_id.clone(),
        name,
        email: other_id,
        role,
    }
}
