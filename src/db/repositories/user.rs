//! User repository

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use crate::models::{User, UserRole};

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user, returning it with the assigned id
    async fn create(&self, user: &User) -> Result<User>;

    /// Get a user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get a user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Overwrite credentials and OTP for an unverified account that is
    /// re-registering
    async fn refresh_unverified(
        &self,
        email: &str,
        password_hash: &str,
        phone: &str,
        otp_code: &str,
        otp_expires_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Store a fresh OTP for an account
    async fn set_otp(
        &self,
        email: &str,
        otp_code: &str,
        otp_expires_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Mark an account's email as verified and clear its OTP
    async fn mark_verified(&self, email: &str) -> Result<bool>;

    /// Whether any admin account exists
    async fn has_admin(&self) -> Result<bool>;
}

/// sqlx-backed user repository
pub struct SqlxUserRepository {
    pool: SqlitePool,
}

impl SqlxUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: SqlitePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        phone: row.get("phone"),
        password_hash: row.get("password_hash"),
        role: row.get::<String, _>("role").parse().unwrap_or_default(),
        avatar_url: row.get("avatar_url"),
        email_verified: row.get("email_verified"),
        otp_code: row.get("otp_code"),
        otp_expires_at: row.get("otp_expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let result = sqlx::query(
            r#"INSERT INTO users
               (email, phone, password_hash, role, avatar_url, email_verified, otp_code, otp_expires_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(&user.avatar_url)
        .bind(user.email_verified)
        .bind(&user.otp_code)
        .bind(user.otp_expires_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        let mut created = user.clone();
        created.id = result.last_insert_rowid();
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_user(&r)))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_user(&r)))
    }

    async fn refresh_unverified(
        &self,
        email: &str,
        password_hash: &str,
        phone: &str,
        otp_code: &str,
        otp_expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE users
               SET password_hash = ?, phone = ?, otp_code = ?, otp_expires_at = ?, updated_at = ?
               WHERE email = ? AND email_verified = 0"#,
        )
        .bind(password_hash)
        .bind(phone)
        .bind(otp_code)
        .bind(otp_expires_at)
        .bind(Utc::now())
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_otp(
        &self,
        email: &str,
        otp_code: &str,
        otp_expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET otp_code = ?, otp_expires_at = ?, updated_at = ? WHERE email = ?",
        )
        .bind(otp_code)
        .bind(otp_expires_at)
        .bind(Utc::now())
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_verified(&self, email: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE users
               SET email_verified = 1, otp_code = NULL, otp_expires_at = NULL, updated_at = ?
               WHERE email = ?"#,
        )
        .bind(Utc::now())
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn has_admin(&self) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM users WHERE role = 'admin'")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.get("count");
        Ok(count > 0)
    }
}
