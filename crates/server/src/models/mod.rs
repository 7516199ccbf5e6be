use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pairwise conversation, materialized lazily in memory.
///
/// This is a cache of derived facts: the identity is a pure function of the
/// participant pair and the history lives in the message store, so nothing
/// here survives a restart or needs to.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub participants: [String; 2],
    pub last_activity: DateTime<Utc>,
}

/// Kind of message payload. The gateway only produces `Text` today; the
/// stored column keeps the wider set for client-side rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::File => "file",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "image" => MessageType::Image,
            "file" => MessageType::File,
            _ => MessageType::Text,
        }
    }
}

/// A durable message as stored and as broadcast in `newMessage`.
///
/// `sender_name` and `sender_role` are captured at send time so reads never
/// join against the directory. They may go stale if the sender's profile
/// later changes; historical attribution is never re-resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub room_id: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    pub message_type: MessageType,
    pub sender_name: String,
    pub sender_role: String,
}

/// Input for appending a message. The store assigns the id, the timestamp
/// and the initial unread flag.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub room_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub message_type: MessageType,
    pub sender_name: String,
    pub sender_role: String,
}

/// Directory record for a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// De-duplicated presence entry returned by `getOnlineUsers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub user_id: String,
    pub user_name: String,
    pub role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Per-requester view of one conversation, computed on demand.
///
/// Never cached: the unread count must reflect the latest store writes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub room_id: String,
    pub last_message: Message,
    pub unread_count: u64,
    pub other_user: UserProfile,
}
