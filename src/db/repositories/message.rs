//! Contact message repository

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{CreateMessageInput, Message};

/// Message repository trait
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Store a new unread message
    async fn create(&self, input: &CreateMessageInput) -> Result<Message>;

    /// Get a message by ID
    async fn get_by_id(&self, id: &str) -> Result<Option<Message>>;

    /// All messages newest first, optionally only unread ones
    async fn list(&self, unread_only: bool) -> Result<Vec<Message>>;

    /// Mark a message as read
    async fn mark_read(&self, id: &str) -> Result<bool>;

    /// Delete a message
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Unread message count for the admin badge
    async fn unread_count(&self) -> Result<i64>;
}

/// sqlx-backed message repository
pub struct SqlxMessageRepository {
    pool: SqlitePool,
}

impl SqlxMessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: SqlitePool) -> Arc<dyn MessageRepository> {
        Arc::new(Self::new(pool))
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Message {
    Message {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        subject: row.get("subject"),
        body: row.get("body"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl MessageRepository for SqlxMessageRepository {
    async fn create(&self, input: &CreateMessageInput) -> Result<Message> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"INSERT INTO messages (id, name, email, subject, body, is_read, created_at)
               VALUES (?, ?, ?, ?, ?, 0, ?)"#,
        )
        .bind(&id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.subject)
        .bind(&input.body)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Message {
            id,
            name: input.name.clone(),
            email: input.email.clone(),
            subject: input.subject.clone(),
            body: input.body.clone(),
            is_read: false,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Message>> {
        let row = sqlx::query("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_message(&r)))
    }

    async fn list(&self, unread_only: bool) -> Result<Vec<Message>> {
        let rows = if unread_only {
            sqlx::query("SELECT * FROM messages WHERE is_read = 0 ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT * FROM messages ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?
        };
        Ok(rows.iter().map(row_to_message).collect())
    }

    async fn mark_read(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE messages SET is_read = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn unread_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM messages WHERE is_read = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }
}
