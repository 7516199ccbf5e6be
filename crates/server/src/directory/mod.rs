//! User directory client.
//!
//! The directory is an external collaborator: this core only resolves
//! participant ids to profile data, it does not own user lifecycle. Lookup
//! failures are always recovered by callers via denormalized message fields.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::info;

use crate::models::UserProfile;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolve a participant to a profile, by id first and then by email
    /// (emails double as participant ids in older clients). `None` when the
    /// id is not a directory id.
    async fn resolve_profile(
        &self,
        participant_id: &str,
    ) -> Result<Option<UserProfile>, DirectoryError>;

    /// All active profiles, for the conversation-partner picker.
    async fn list_active(&self) -> Result<Vec<UserProfile>, DirectoryError>;
}

/// Directory backed by the users SQLite database.
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    pub async fn new(db_path: &Path) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
                .context("invalid users database path")?
                .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("failed to open users database")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                role TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&pool)
        .await?;

        info!("[Directory] Users database ready at {:?}", db_path);

        Ok(Self { pool })
    }

    /// Seed or update a directory entry. Used by provisioning and tests.
    pub async fn upsert_user(&self, profile: &UserProfile) -> Result<(), DirectoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, is_active)
            VALUES (?, ?, ?, ?, 1)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                role = excluded.role
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.role)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Directory for SqliteDirectory {
    async fn resolve_profile(
        &self,
        participant_id: &str,
    ) -> Result<Option<UserProfile>, DirectoryError> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, name, email, role FROM users WHERE id = ? AND is_active = 1",
        )
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => Some(row),
            None => {
                sqlx::query_as(
                    "SELECT id, name, email, role FROM users WHERE email = ? AND is_active = 1",
                )
                .bind(participant_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(row.map(|(id, name, email, role)| UserProfile {
            id,
            name,
            email,
            role,
        }))
    }

    async fn list_active(&self) -> Result<Vec<UserProfile>, DirectoryError> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, name, email, role FROM users WHERE is_active = 1 ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, email, role)| UserProfile {
                id,
                name,
                email,
                role,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn profile(id: &str, name: &str, email: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            role: "clinician".to_string(),
        }
    }

    #[tokio::test]
    async fn resolves_by_id_then_email() {
        let dir = TempDir::new().unwrap();
        let directory = SqliteDirectory::new(&dir.path().join("users.sqlite"))
            .await
            .unwrap();

        directory
            .upsert_user(&profile("u1", "Dr. Stone", "stone@example.org"))
            .await
            .unwrap();

        let by_id = directory.resolve_profile("u1").await.unwrap().unwrap();
        assert_eq!(by_id.name, "Dr. Stone");

        let by_email = directory
            .resolve_profile("stone@example.org")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, "u1");

        assert!(directory.resolve_profile("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_active_is_sorted_by_name() {
        let dir = TempDir::new().unwrap();
        let directory = SqliteDirectory::new(&dir.path().join("users.sqlite"))
            .await
            .unwrap();

        directory
            .upsert_user(&profile("u2", "Zoe", "zoe@example.org"))
            .await
            .unwrap();
        directory
            .upsert_user(&profile("u1", "Ada", "ada@example.org"))
            .await
            .unwrap();

        let users = directory.list_active().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].name, "Ada");
        assert_eq!(users[1].name, "Zoe");
    }
}
