//! Durable message storage.
//!
//! The store exclusively owns message records: the routing core only ever
//! appends or flips the read flag. Retention and deletion are out of scope.

pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Message, NewMessage};

pub use sqlite::SqliteMessageStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append one message durably. Assigns the id and timestamp; the record
    /// starts unread. Exactly one attempt per call; the caller does not retry.
    async fn append(&self, new: NewMessage) -> Result<Message, StoreError>;

    /// Full history of one conversation, ordered by creation time ascending.
    async fn find_by_conversation(&self, room_id: &str) -> Result<Vec<Message>, StoreError>;

    /// Every message the participant sent or received, newest first.
    async fn find_for_participant(&self, participant_id: &str) -> Result<Vec<Message>, StoreError>;

    /// Flip the read flag for exactly the given ids. Returns how many rows
    /// actually changed.
    async fn mark_read(&self, message_ids: &[String]) -> Result<u64, StoreError>;

    /// Unread messages addressed to the participant, across conversations.
    async fn count_unread(&self, participant_id: &str) -> Result<u64, StoreError>;
}
