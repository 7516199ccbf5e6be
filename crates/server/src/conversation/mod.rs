//! Conversation identity and in-memory conversation metadata.
//!
//! The conversation id is the one algorithmic invariant the whole messaging
//! model depends on: a pure, order-independent function of the unordered
//! participant pair. Swapping sender and receiver must yield the same id.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;

use crate::models::Conversation;

/// Derive the stable conversation id for a participant pair.
///
/// Ids are sorted lexicographically before joining, so both initiators map
/// to the same room.
pub fn conversation_id(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("room_{first}_{second}")
}

/// Lazily materializes conversation metadata on first reference.
///
/// No persistence: after a restart the cache rebuilds from the first message
/// referencing a given id. The authoritative history lives in the store.
pub struct ConversationResolver {
    conversations: Mutex<HashMap<String, Conversation>>,
}

impl ConversationResolver {
    pub fn new() -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached conversation, creating it with `last_activity = now`
    /// if absent.
    pub fn ensure(&self, room_id: &str, participants: [String; 2]) -> Conversation {
        let mut conversations = self.conversations.lock();
        conversations
            .entry(room_id.to_string())
            .or_insert_with(|| {
                debug!("materialized conversation {}", room_id);
                Conversation {
                    id: room_id.to_string(),
                    participants,
                    last_activity: Utc::now(),
                }
            })
            .clone()
    }

    pub fn exists(&self, room_id: &str) -> bool {
        self.conversations.lock().contains_key(room_id)
    }

    /// Bump `last_activity`; called on every successful send.
    pub fn touch(&self, room_id: &str) {
        if let Some(conversation) = self.conversations.lock().get_mut(room_id) {
            conversation.last_activity = Utc::now();
        }
    }

    pub fn participants(&self, room_id: &str) -> Option<[String; 2]> {
        self.conversations
            .lock()
            .get(room_id)
            .map(|c| c.participants.clone())
    }
}

impl Default for ConversationResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_is_symmetric() {
        let pairs = [
            ("alice", "bob"),
            ("bob", "alice"),
            ("patient-42", "dr-stone"),
            ("z", "a"),
            ("same", "same"),
        ];
        for (a, b) in pairs {
            assert_eq!(conversation_id(a, b), conversation_id(b, a));
        }
    }

    #[test]
    fn conversation_id_sorts_participants() {
        assert_eq!(conversation_id("bob", "alice"), "room_alice_bob");
        assert_eq!(conversation_id("alice", "bob"), "room_alice_bob");
    }

    #[test]
    fn ensure_is_idempotent_and_touch_advances_activity() {
        let resolver = ConversationResolver::new();
        let room_id = conversation_id("a", "b");

        let first = resolver.ensure(&room_id, ["a".into(), "b".into()]);
        let second = resolver.ensure(&room_id, ["a".into(), "b".into()]);
        assert_eq!(first.last_activity, second.last_activity);
        assert!(resolver.exists(&room_id));

        resolver.touch(&room_id);
        let touched = resolver.ensure(&room_id, ["a".into(), "b".into()]);
        assert!(touched.last_activity >= first.last_activity);
    }

    #[test]
    fn unknown_room_is_absent() {
        let resolver = ConversationResolver::new();
        assert!(!resolver.exists("room_x_y"));
        assert!(resolver.participants("room_x_y").is_none());
        // touch on an unknown room is a no-op
        resolver.touch("room_x_y");
        assert!(!resolver.exists("room_x_y"));
    }
}
