//! User service
//!
//! Account provisioning and login:
//! - registration is OTP-gated; an account cannot log in until its email
//!   is verified with the emailed 6-digit code
//! - an unverified account that registers again gets fresh credentials
//!   and a fresh OTP instead of a duplicate error
//! - login is role-scoped: the admin entry point refuses non-admin
//!   accounts outright
//!
//! Successful login returns a signed bearer token plus the denormalized
//! user snapshot clients keep for the session lifetime.

use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::config::AuthConfig;
use crate::db::repositories::UserRepository;
use crate::models::{User, UserRole, UserSnapshot};
use crate::services::email::{generate_otp, EmailService};
use crate::services::password::{hash_password, verify_password};
use crate::services::token::TokenService;

/// Error types for auth operations
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid credentials or unauthorized role
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Invalid input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Email already registered and verified
    #[error("Email is already registered and verified")]
    UserExists,

    /// Account missing
    #[error("User not found")]
    NotFound,

    /// OTP expired, wrong, or already verified
    #[error("{0}")]
    Otp(String),

    /// Infrastructure failure
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub user: UserSnapshot,
}

/// Auth service
pub struct AuthService {
    repo: Arc<dyn UserRepository>,
    tokens: TokenService,
    email: Arc<EmailService>,
    otp_ttl_minutes: i64,
}

impl AuthService {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        tokens: TokenService,
        email: Arc<EmailService>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            repo,
            tokens,
            email,
            otp_ttl_minutes: config.otp_ttl_minutes,
        }
    }

    /// Register a user account, or refresh an unverified one.
    ///
    /// Either way a new OTP is generated, stored, and emailed. Returns
    /// the email the OTP was sent to.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        phone: &str,
    ) -> Result<String, AuthError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::Validation("A valid email address is required".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::Validation("Password cannot be empty".to_string()));
        }

        let otp_code = generate_otp();
        let otp_expires_at = Utc::now() + Duration::minutes(self.otp_ttl_minutes);
        let password_hash = hash_password(password).context("Failed to hash password")?;

        match self.repo.get_by_email(&email).await? {
            Some(existing) if existing.email_verified => return Err(AuthError::UserExists),
            Some(_) => {
                // Unverified re-registration: overwrite credentials and
                // restart the OTP window.
                self.repo
                    .refresh_unverified(&email, &password_hash, phone, &otp_code, otp_expires_at)
                    .await?;
            }
            None => {
                let user = User::new(
                    email.clone(),
                    phone.to_string(),
                    password_hash,
                    UserRole::User,
                    Some(otp_code.clone()),
                    Some(otp_expires_at),
                );
                self.repo.create(&user).await?;
            }
        }

        self.email
            .send_otp(&email, &otp_code)
            .await
            .context("Failed to send verification email")?;

        Ok(email)
    }

    /// Verify a registration OTP.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let email = email.trim().to_lowercase();
        let user = self
            .repo
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::NotFound)?;

        if user.email_verified {
            return Err(AuthError::Otp("Email is already verified".to_string()));
        }
        if let Some(expires_at) = user.otp_expires_at {
            if expires_at < Utc::now() {
                return Err(AuthError::Otp(
                    "Verification code has expired; request a new one".to_string(),
                ));
            }
        }
        if user.otp_code.as_deref() != Some(code) {
            return Err(AuthError::Otp("Incorrect verification code".to_string()));
        }

        self.repo.mark_verified(&email).await?;
        Ok(())
    }

    /// Issue a fresh OTP for an unverified account.
    pub async fn resend_otp(&self, email: &str) -> Result<(), AuthError> {
        let email = email.trim().to_lowercase();
        let user = self
            .repo
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::NotFound)?;

        if user.email_verified {
            return Err(AuthError::Otp("Email is already verified".to_string()));
        }

        let otp_code = generate_otp();
        let otp_expires_at = Utc::now() + Duration::minutes(self.otp_ttl_minutes);
        self.repo.set_otp(&email, &otp_code, otp_expires_at).await?;

        self.email
            .send_otp(&email, &otp_code)
            .await
            .context("Failed to send verification email")?;

        Ok(())
    }

    /// Log in, scoped to the given role entry point.
    ///
    /// `required_role = Some(Admin)` refuses non-admin accounts;
    /// `Some(User)` additionally requires a verified email, matching the
    /// separate admin/user login endpoints.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        required_role: Option<UserRole>,
    ) -> Result<LoginOutcome, AuthError> {
        let email = email.trim().to_lowercase();
        let user = self
            .repo
            .get_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::Authentication("Invalid credentials".to_string()))?;

        let password_ok =
            verify_password(password, &user.password_hash).context("Failed to verify password")?;
        if !password_ok {
            return Err(AuthError::Authentication("Invalid credentials".to_string()));
        }

        if let Some(required) = required_role {
            if required == UserRole::Admin && user.role != UserRole::Admin {
                return Err(AuthError::Authentication("Unauthorized access".to_string()));
            }
        }

        if user.role == UserRole::User && !user.email_verified {
            return Err(AuthError::Authentication(
                "Email is not verified yet; check your inbox for the verification code".to_string(),
            ));
        }

        let access_token = self
            .tokens
            .issue(&user.email, user.role)
            .context("Failed to issue access token")?;

        Ok(LoginOutcome {
            access_token,
            user: user.snapshot(),
        })
    }

    /// Resolve a verified bearer subject to the current account.
    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self.repo.get_by_email(email).await?)
    }

    /// Look up an account by ID (e.g. to resolve a reservation owner).
    pub async fn user_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        Ok(self.repo.get_by_id(id).await?)
    }

    /// Create the bootstrap admin on first start when configured and no
    /// admin exists yet.
    pub async fn ensure_bootstrap_admin(&self, config: &AuthConfig) -> Result<bool, AuthError> {
        let (email, password) = match (
            config.bootstrap_admin_email.as_deref(),
            config.bootstrap_admin_password.as_deref(),
        ) {
            (Some(email), Some(password)) => (email, password),
            _ => return Ok(false),
        };

        if self.repo.has_admin().await? {
            return Ok(false);
        }

        let password_hash = hash_password(password).context("Failed to hash password")?;
        let admin = User::new(
            email.trim().to_lowercase(),
            String::new(),
            password_hash,
            UserRole::Admin,
            None,
            None,
        );
        self.repo.create(&admin).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailConfig;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::{create_test_pool, migrations};
    use sqlx::SqlitePool;

    async fn setup() -> (AuthService, SqlitePool) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        let config = AuthConfig {
            jwt_secret: "test-secret".to_string(),
            ..AuthConfig::default()
        };
        let service = AuthService::new(
            SqlxUserRepository::boxed(pool.clone()),
            TokenService::new(&config.jwt_secret, config.token_ttl_minutes),
            Arc::new(EmailService::new(EmailConfig::default())),
            &config,
        );
        (service, pool)
    }

    /// Registration wants to email an OTP, which fails without SMTP; the
    /// account row is still written first, so tests fetch the stored OTP
    /// straight from the database.
    async fn register_ignoring_mail(service: &AuthService, email: &str, password: &str) {
        let _ = service.register(email, password, "0812").await;
    }

    async fn stored_otp(pool: &SqlitePool, email: &str) -> String {
        use sqlx::Row;
        let row = sqlx::query("SELECT otp_code FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(pool)
            .await
            .unwrap();
        row.get::<Option<String>, _>("otp_code").unwrap()
    }

    #[tokio::test]
    async fn test_register_verify_login_flow() {
        let (service, pool) = setup().await;
        register_ignoring_mail(&service, "budi@example.com", "kopi-susu").await;

        // Unverified accounts cannot log in.
        let err = service
            .login("budi@example.com", "kopi-susu", Some(UserRole::User))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Authentication(_)));

        let otp = stored_otp(&pool, "budi@example.com").await;
        service.verify_otp("budi@example.com", &otp).await.unwrap();

        let outcome = service
            .login("budi@example.com", "kopi-susu", Some(UserRole::User))
            .await
            .unwrap();
        assert!(!outcome.access_token.is_empty());
        assert_eq!(outcome.user.email, "budi@example.com");
        assert_eq!(outcome.user.role, UserRole::User);
    }

    #[tokio::test]
    async fn test_register_normalizes_email() {
        let (service, pool) = setup().await;
        register_ignoring_mail(&service, "  Budi@Example.COM ", "kopi-susu").await;
        let otp = stored_otp(&pool, "budi@example.com").await;
        service.verify_otp("budi@example.com", &otp).await.unwrap();
    }

    #[tokio::test]
    async fn test_register_rejects_verified_duplicate() {
        let (service, pool) = setup().await;
        register_ignoring_mail(&service, "budi@example.com", "kopi-susu").await;
        let otp = stored_otp(&pool, "budi@example.com").await;
        service.verify_otp("budi@example.com", &otp).await.unwrap();

        let err = service
            .register("budi@example.com", "different", "0813")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserExists));
    }

    #[tokio::test]
    async fn test_unverified_reregistration_rotates_otp() {
        let (service, pool) = setup().await;
        register_ignoring_mail(&service, "budi@example.com", "first-password").await;
        let first_otp = stored_otp(&pool, "budi@example.com").await;

        register_ignoring_mail(&service, "budi@example.com", "second-password").await;
        let second_otp = stored_otp(&pool, "budi@example.com").await;

        // The first OTP only keeps working if the rotation happened to
        // generate the same code; the new password must be in effect
        // either way.
        service.verify_otp("budi@example.com", &second_otp).await.unwrap();
        assert!(service
            .login("budi@example.com", "second-password", Some(UserRole::User))
            .await
            .is_ok());
        assert!(service
            .login("budi@example.com", "first-password", Some(UserRole::User))
            .await
            .is_err());
        let _ = first_otp;
    }

    #[tokio::test]
    async fn test_verify_otp_rejects_wrong_and_expired() {
        let (service, pool) = setup().await;
        register_ignoring_mail(&service, "budi@example.com", "kopi-susu").await;

        let err = service
            .verify_otp("budi@example.com", "000000x")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Otp(_)));

        // Force the OTP window shut.
        sqlx::query("UPDATE users SET otp_expires_at = datetime('now', '-1 hour') WHERE email = ?")
            .bind("budi@example.com")
            .execute(&pool)
            .await
            .unwrap();
        let otp = stored_otp(&pool, "budi@example.com").await;
        let err = service.verify_otp("budi@example.com", &otp).await.unwrap_err();
        assert!(matches!(err, AuthError::Otp(_)));
    }

    #[tokio::test]
    async fn test_verify_otp_idempotent_rejection() {
        let (service, pool) = setup().await;
        register_ignoring_mail(&service, "budi@example.com", "kopi-susu").await;
        let otp = stored_otp(&pool, "budi@example.com").await;
        service.verify_otp("budi@example.com", &otp).await.unwrap();

        let err = service.verify_otp("budi@example.com", &otp).await.unwrap_err();
        assert!(matches!(err, AuthError::Otp(_)));
    }

    #[tokio::test]
    async fn test_admin_login_scope() {
        let (service, _pool) = setup().await;
        let config = AuthConfig {
            bootstrap_admin_email: Some("admin@example.com".to_string()),
            bootstrap_admin_password: Some("rahasia".to_string()),
            ..AuthConfig::default()
        };
        assert!(service.ensure_bootstrap_admin(&config).await.unwrap());
        // Second call is a no-op once an admin exists.
        assert!(!service.ensure_bootstrap_admin(&config).await.unwrap());

        let outcome = service
            .login("admin@example.com", "rahasia", Some(UserRole::Admin))
            .await
            .unwrap();
        assert_eq!(outcome.user.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_admin_endpoint_refuses_regular_user() {
        let (service, pool) = setup().await;
        register_ignoring_mail(&service, "budi@example.com", "kopi-susu").await;
        let otp = stored_otp(&pool, "budi@example.com").await;
        service.verify_otp("budi@example.com", &otp).await.unwrap();

        let err = service
            .login("budi@example.com", "kopi-susu", Some(UserRole::Admin))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let (service, pool) = setup().await;
        register_ignoring_mail(&service, "budi@example.com", "kopi-susu").await;
        let otp = stored_otp(&pool, "budi@example.com").await;
        service.verify_otp("budi@example.com", &otp).await.unwrap();

        let err = service
            .login("budi@example.com", "wrong", Some(UserRole::User))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_resend_otp_requires_unverified_account() {
        let (service, pool) = setup().await;
        assert!(matches!(
            service.resend_otp("ghost@example.com").await.unwrap_err(),
            AuthError::NotFound
        ));

        register_ignoring_mail(&service, "budi@example.com", "kopi-susu").await;
        let otp = stored_otp(&pool, "budi@example.com").await;
        service.verify_otp("budi@example.com", &otp).await.unwrap();

        assert!(matches!(
            service.resend_otp("budi@example.com").await.unwrap_err(),
            AuthError::Otp(_)
        ));
    }
}
