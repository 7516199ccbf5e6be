//! Error taxonomy for the routing core.
//!
//! Every user-visible failure is delivered as a structured `error` event on
//! the session channel; nothing here is fatal to the connection itself.
//! Directory lookup failures are absent on purpose: the aggregator recovers
//! them locally via the denormalized sender fields and never surfaces them.

use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum ChatError {
    /// Operation attempted before `register`. Recoverable, connection stays open.
    #[error("session is not registered")]
    NotRegistered,

    /// The caller must go through `startConversation` first.
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// Single persistence attempt failed. The message was not broadcast and
    /// the core does not retry; the client resubmits.
    #[error("message persistence failed: {0}")]
    Persistence(#[source] StoreError),

    /// History load failed during `startConversation`. The join itself stands.
    #[error("history load failed for {room_id}: {source}")]
    HistoryLoad {
        room_id: String,
        #[source]
        source: StoreError,
    },

    /// Batch read-flag update failed; no `messagesRead` event was emitted.
    #[error("mark-read failed for {room_id}: {source}")]
    MarkRead {
        room_id: String,
        #[source]
        source: StoreError,
    },
}

impl ChatError {
    /// Wire-facing message for the `error` event.
    pub fn user_message(&self) -> &'static str {
        match self {
            ChatError::NotRegistered => "You must register first",
            ChatError::ConversationNotFound(_) => "Conversation not found",
            ChatError::Persistence(_) => "Failed to send message",
            ChatError::HistoryLoad { .. } => "Failed to load message history",
            ChatError::MarkRead { .. } => "Failed to mark messages as read",
        }
    }
}
