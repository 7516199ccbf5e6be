//! SQLite-backed message store.
//!
//! Schema is created on startup. Timestamps are stored as RFC 3339 strings
//! in UTC, which keeps lexicographic and chronological order identical.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;
use uuid::Uuid;

use super::{MessageStore, StoreError};
use crate::models::{Message, MessageType, NewMessage};

type MessageRow = (
    String, // id
    String, // room_id
    String, // sender_id
    String, // receiver_id
    String, // content
    String, // message_type
    String, // sender_name
    String, // sender_role
    String, // created_at
    bool,   // is_read
);

const SELECT_COLUMNS: &str = "id, room_id, sender_id, receiver_id, content, \
     message_type, sender_name, sender_role, created_at, is_read";

pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    pub async fn new(db_path: &Path) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
                .context("invalid message database path")?
                .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("failed to open message database")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                room_id TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                receiver_id TEXT NOT NULL,
                content TEXT NOT NULL,
                message_type TEXT NOT NULL DEFAULT 'text',
                sender_name TEXT NOT NULL DEFAULT '',
                sender_role TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_room ON messages(room_id, created_at)",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_receiver ON messages(receiver_id, is_read)",
        )
        .execute(&pool)
        .await?;

        info!("[Store] Message database ready at {:?}", db_path);

        Ok(Self { pool })
    }

    fn row_to_message(row: MessageRow) -> Result<Message, StoreError> {
        let (
            id,
            room_id,
            sender_id,
            receiver_id,
            content,
            message_type,
            sender_name,
            sender_role,
            created_at,
            is_read,
        ) = row;
        let timestamp = DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc);
        Ok(Message {
            id,
            sender_id,
            receiver_id,
            content,
            room_id,
            timestamp,
            is_read,
            message_type: MessageType::parse(&message_type),
            sender_name,
            sender_role,
        })
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn append(&self, new: NewMessage) -> Result<Message, StoreError> {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            content: new.content,
            room_id: new.room_id,
            timestamp: Utc::now(),
            is_read: false,
            message_type: new.message_type,
            sender_name: new.sender_name,
            sender_role: new.sender_role,
        };

        sqlx::query(
            r#"
            INSERT INTO messages
                (id, room_id, sender_id, receiver_id, content, message_type,
                 sender_name, sender_role, created_at, is_read)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.room_id)
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .bind(&message.sender_name)
        .bind(&message.sender_role)
        .bind(message.timestamp.to_rfc3339())
        .bind(message.is_read)
        .execute(&self.pool)
        .await?;

        Ok(message)
    }

    async fn find_by_conversation(&self, room_id: &str) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM messages WHERE room_id = ? ORDER BY created_at ASC, id ASC"
        );
        let rows: Vec<MessageRow> = sqlx::query_as(&sql)
            .bind(room_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_message).collect()
    }

    async fn find_for_participant(
        &self,
        participant_id: &str,
    ) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM messages \
             WHERE sender_id = ? OR receiver_id = ? \
             ORDER BY created_at DESC, id DESC"
        );
        let rows: Vec<MessageRow> = sqlx::query_as(&sql)
            .bind(participant_id)
            .bind(participant_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_message).collect()
    }

    async fn mark_read(&self, message_ids: &[String]) -> Result<u64, StoreError> {
        if message_ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; message_ids.len()].join(", ");
        let sql = format!("UPDATE messages SET is_read = 1 WHERE id IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for id in message_ids {
            query = query.bind(id);
        }
        let result = query.execute(&self.pool).await?;

        Ok(result.rows_affected())
    }

    async fn count_unread(&self, participant_id: &str) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM messages WHERE receiver_id = ? AND is_read = 0",
        )
        .bind(participant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }
}
