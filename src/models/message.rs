//! Contact message model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A contact-form submission from a site visitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Public identifier (UUID)
    pub id: String,
    /// Sender name
    pub name: String,
    /// Sender email address
    pub email: String,
    /// Subject line
    pub subject: String,
    /// Message body
    pub body: String,
    /// Whether an admin has read the message
    pub is_read: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Input for creating a contact message
#[derive(Debug, Clone)]
pub struct CreateMessageInput {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub body: String,
}

impl CreateMessageInput {
    /// Validate required fields before dispatch.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name is required".to_string());
        }
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err("A valid email address is required".to_string());
        }
        if self.subject.trim().is_empty() {
            return Err("Subject is required".to_string());
        }
        if self.body.trim().is_empty() {
            return Err("Message body is required".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> CreateMessageInput {
        CreateMessageInput {
            name: "Siti".to_string(),
            email: "siti@example.com".to_string(),
            subject: "Group booking".to_string(),
            body: "Do you take groups of 15 on weekends?".to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_complete_input() {
        assert!(valid_input().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let mut input = valid_input();
        input.name = String::new();
        assert!(input.validate().is_err());

        let mut input = valid_input();
        input.subject = "   ".to_string();
        assert!(input.validate().is_err());

        let mut input = valid_input();
        input.body = String::new();
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_malformed_email() {
        let mut input = valid_input();
        input.email = "not-an-email".to_string();
        assert!(input.validate().is_err());
    }
}
