//! Wire protocol for the per-session channel.
//!
//! Every frame, both directions, is `{"event": <name>, "data": <payload>}`.
//! Event names and payload shapes are part of the client contract; renames
//! here are breaking changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Message, MessageType, OnlineUser, PresenceStatus};

/// Frames accepted from clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "register", rename_all = "camelCase")]
    Register {
        user_id: String,
        user_name: Option<String>,
        role: String,
    },

    #[serde(rename = "startConversation", rename_all = "camelCase")]
    StartConversation { target_user_id: String },

    #[serde(rename = "sendMessage", rename_all = "camelCase")]
    SendMessage {
        room_id: String,
        content: String,
        receiver_id: String,
        #[serde(default)]
        message_type: MessageType,
    },

    #[serde(rename = "markAsRead", rename_all = "camelCase")]
    MarkAsRead {
        room_id: String,
        message_ids: Vec<String>,
    },

    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing { room_id: String, is_typing: bool },

    #[serde(rename = "getOnlineUsers")]
    GetOnlineUsers,
}

/// Frames emitted to clients, as replies or broadcasts.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "user-status-changed", rename_all = "camelCase")]
    UserStatusChanged {
        user_id: String,
        user_name: String,
        role: String,
        status: PresenceStatus,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "conversationStarted", rename_all = "camelCase")]
    ConversationStarted { room_id: String },

    #[serde(rename = "messageHistory", rename_all = "camelCase")]
    MessageHistory {
        room_id: String,
        messages: Vec<Message>,
    },

    #[serde(rename = "newMessage")]
    NewMessage(Message),

    /// Lightweight preview for a receiver who is online but not in the room.
    #[serde(rename = "newConversation", rename_all = "camelCase")]
    NewConversation {
        room_id: String,
        last_message: String,
        sender_id: String,
        sender_name: String,
        sender_role: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "messagesRead", rename_all = "camelCase")]
    MessagesRead {
        room_id: String,
        message_ids: Vec<String>,
    },

    #[serde(rename = "userTyping", rename_all = "camelCase")]
    UserTyping {
        user_id: String,
        user_name: String,
        is_typing: bool,
        room_id: String,
    },

    #[serde(rename = "onlineUsers")]
    OnlineUsers(Vec<OnlineUser>),

    #[serde(rename = "error")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_parse_with_camel_case_payloads() {
        let frame = r#"{"event":"register","data":{"userId":"u1","userName":"Ada","role":"clinician"}}"#;
        let event: ClientEvent = serde_json::from_str(frame).unwrap();
        match event {
            ClientEvent::Register {
                user_id,
                user_name,
                role,
            } => {
                assert_eq!(user_id, "u1");
                assert_eq!(user_name.as_deref(), Some("Ada"));
                assert_eq!(role, "clinician");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let frame = r#"{"event":"sendMessage","data":{"roomId":"room_a_b","content":"hi","receiverId":"b"}}"#;
        let event: ClientEvent = serde_json::from_str(frame).unwrap();
        match event {
            ClientEvent::SendMessage {
                room_id,
                message_type,
                ..
            } => {
                assert_eq!(room_id, "room_a_b");
                assert_eq!(message_type, MessageType::Text);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn get_online_users_takes_no_payload() {
        let frame = r#"{"event":"getOnlineUsers"}"#;
        assert!(matches!(
            serde_json::from_str::<ClientEvent>(frame).unwrap(),
            ClientEvent::GetOnlineUsers
        ));
    }

    #[test]
    fn status_broadcast_uses_kebab_event_name() {
        let event = ServerEvent::UserStatusChanged {
            user_id: "u1".into(),
            user_name: "Ada".into(),
            role: "clinician".into(),
            status: PresenceStatus::Online,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"user-status-changed""#));
        assert!(json.contains(r#""status":"online""#));
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"noSuchEvent"}"#).is_err());
        assert!(serde_json::from_str::<ClientEvent>("not json").is_err());
    }
}
