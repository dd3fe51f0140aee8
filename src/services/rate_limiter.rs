//! Login rate limiting
//!
//! Bounds brute-force attempts: 5 failed logins per account within 15
//! minutes locks the account out until the window slides past.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

const MAX_FAILED_ATTEMPTS: usize = 5;
const WINDOW_MINUTES: i64 = 15;

/// In-memory failed-login tracker keyed by account email.
#[derive(Default)]
pub struct LoginRateLimiter {
    attempts: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the account is currently locked out.
    pub async fn is_limited(&self, email: &str) -> bool {
        let mut attempts = self.attempts.write().await;
        let cutoff = Utc::now() - Duration::minutes(WINDOW_MINUTES);

        let entry = attempts.entry(email.to_lowercase()).or_default();
        entry.retain(|time| *time > cutoff);
        entry.len() >= MAX_FAILED_ATTEMPTS
    }

    /// Record a failed login attempt.
    pub async fn record_failure(&self, email: &str) {
        let mut attempts = self.attempts.write().await;
        attempts.entry(email.to_lowercase()).or_default().push(Utc::now());
    }

    /// Clear the account's failure history on successful login.
    pub async fn clear(&self, email: &str) {
        let mut attempts = self.attempts.write().await;
        attempts.remove(&email.to_lowercase());
    }

    /// Drop entries older than the window. Called periodically.
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - Duration::minutes(WINDOW_MINUTES);
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
    }
}
