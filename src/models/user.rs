//! User model
//!
//! Defines the User entity and the role enum used for authorization.
//! Accounts are provisioned through OTP-gated email verification; an
//! unverified account cannot log in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User entity representing a registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique, doubles as the login name)
    pub email: String,
    /// Phone number for reservation notifications
    pub phone: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// User role
    pub role: UserRole,
    /// Optional avatar image URL
    pub avatar_url: Option<String>,
    /// Whether the email address has been verified via OTP
    pub email_verified: bool,
    /// Pending OTP code, empty once verified
    #[serde(skip_serializing)]
    pub otp_code: Option<String>,
    /// When the pending OTP expires
    #[serde(skip_serializing)]
    pub otp_expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new unverified user with a pending OTP.
    ///
    /// The password must already be hashed; use
    /// `services::password::hash_password()`.
    pub fn new(
        email: String,
        phone: String,
        password_hash: String,
        role: UserRole,
        otp_code: Option<String>,
        otp_expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Set by the database
            email,
            phone,
            password_hash,
            role,
            avatar_url: None,
            email_verified: role == UserRole::Admin,
            otp_code,
            otp_expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Build the denormalized snapshot handed to clients on login.
    pub fn snapshot(&self) -> UserSnapshot {
        UserSnapshot {
            email: self.email.clone(),
            role: self.role,
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular customer account
    User,
    /// Back-office administrator
    Admin,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::User
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Denormalized user snapshot held by the client for the lifetime of a
/// session. Mirrors the `user` object returned by the login endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub email: String,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}
