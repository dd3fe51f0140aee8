//! Contact message service
//!
//! Thin business layer over the message repository; the unread count
//! feeds the same badge-polling pattern the reservation console uses.

use std::sync::Arc;
use thiserror::Error;

use crate::db::repositories::MessageRepository;
use crate::models::{CreateMessageInput, Message};

/// Error types for message operations
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Message not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Contact message service
pub struct MessageService {
    repo: Arc<dyn MessageRepository>,
}

impl MessageService {
    pub fn new(repo: Arc<dyn MessageRepository>) -> Self {
        Self { repo }
    }

    /// Store a visitor's contact-form submission.
    pub async fn create(&self, input: CreateMessageInput) -> Result<Message, MessageError> {
        input.validate().map_err(MessageError::Validation)?;
        Ok(self.repo.create(&input).await?)
    }

    /// All messages newest first, optionally only unread ones.
    pub async fn list(&self, unread_only: bool) -> Result<Vec<Message>, MessageError> {
        Ok(self.repo.list(unread_only).await?)
    }

    /// Mark a message as read, returning the updated record.
    pub async fn mark_read(&self, id: &str) -> Result<Message, MessageError> {
        if !self.repo.mark_read(id).await? {
            return Err(MessageError::NotFound);
        }
        self.repo.get_by_id(id).await?.ok_or(MessageError::NotFound)
    }

    /// Delete a message permanently.
    pub async fn delete(&self, id: &str) -> Result<(), MessageError> {
        if !self.repo.delete(id).await? {
            return Err(MessageError::NotFound);
        }
        Ok(())
    }

    /// Unread count for the admin badge.
    pub async fn unread_count(&self) -> Result<i64, MessageError> {
        Ok(self.repo.unread_count().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxMessageRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> MessageService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        MessageService::new(SqlxMessageRepository::boxed(pool))
    }

    fn input() -> CreateMessageInput {
        CreateMessageInput {
            name: "Siti".to_string(),
            email: "siti@example.com".to_string(),
            subject: "Opening hours".to_string(),
            body: "Are you open on public holidays?".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_badge_lifecycle() {
        let service = setup().await;
        let msg = service.create(input()).await.unwrap();
        assert!(!msg.is_read);
        assert_eq!(service.unread_count().await.unwrap(), 1);

        let read = service.mark_read(&msg.id).await.unwrap();
        assert!(read.is_read);
        assert_eq!(service.unread_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let service = setup().await;
        let mut bad = input();
        bad.email = "nope".to_string();
        assert!(matches!(
            service.create(bad).await,
            Err(MessageError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_read_and_delete_missing() {
        let service = setup().await;
        assert!(matches!(
            service.mark_read("missing").await,
            Err(MessageError::NotFound)
        ));
        assert!(matches!(
            service.delete("missing").await,
            Err(MessageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_message() {
        let service = setup().await;
        let msg = service.create(input()).await.unwrap();
        service.delete(&msg.id).await.unwrap();
        assert!(service.list(false).await.unwrap().is_empty());
    }
}
