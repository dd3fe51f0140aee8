//! Session manager
//!
//! Owns the client-held session state: a bearer token, the denormalized
//! user snapshot, and the computed validity window. Every operation is a
//! pure local-state query — nothing here performs a network round-trip,
//! and nothing can fail in a way that blocks the caller. Malformed
//! stored state always reads as "no session".
//!
//! The expiry window is `min(now + role duration, token exp claim)`:
//! the role-specific duration (admin 120 minutes, user 60) caps the
//! session even when the server issued a longer-lived token, and a
//! shorter-lived token wins over the configured duration. The token's
//! payload is decoded best-effort; an undecodable token simply falls
//! back to the configured duration.

use data_encoding::BASE64URL_NOPAD;
use std::sync::Arc;

use crate::models::{UserRole, UserSnapshot};
use crate::session::clock::{Clock, SystemClock};
use crate::session::store::SessionStore;

/// Store key for the bearer token.
pub const TOKEN_KEY: &str = "token";
/// Store key for the serialized user snapshot.
pub const USER_KEY: &str = "user";
/// Store key for the session start (epoch milliseconds).
pub const STARTED_AT_KEY: &str = "sessionStartedAt";
/// Store key for the session expiry (epoch milliseconds).
pub const EXPIRES_AT_KEY: &str = "sessionExpiresAt";

/// Role-specific session duration in minutes.
pub fn role_session_minutes(role: UserRole) -> i64 {
    match role {
        UserRole::Admin => 120,
        UserRole::User => 60,
    }
}

/// Client-held session state machine.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Begin a session from a freshly issued credential.
    ///
    /// Persists the token, the user snapshot, and the computed validity
    /// window. Starting a new session overwrites any previous one; it
    /// never extends an existing window.
    pub fn start_session(&self, role: UserRole, token: &str, user: &UserSnapshot) {
        let now_ms = self.clock.now().timestamp_millis();
        let configured_ms = role_session_minutes(role) * 60 * 1000;

        let mut expires_at = now_ms + configured_ms;
        if let Some(token_exp_ms) = decode_exp_millis(token) {
            // Use the earlier of the configured window and the token's
            // real expiry.
            expires_at = expires_at.min(token_exp_ms);
        }

        self.store.set(TOKEN_KEY, token);
        if let Ok(json) = serde_json::to_string(user) {
            self.store.set(USER_KEY, &json);
        }
        self.store.set(STARTED_AT_KEY, &now_ms.to_string());
        self.store.set(EXPIRES_AT_KEY, &expires_at.to_string());
    }

    /// Whether a session exists and has not expired.
    pub fn is_session_valid(&self) -> bool {
        match self.expires_at_millis() {
            Some(expires_at) => self.clock.now().timestamp_millis() < expires_at,
            None => false,
        }
    }

    /// Milliseconds until expiry; 0 when absent or already expired.
    pub fn remaining_ms(&self) -> i64 {
        match self.expires_at_millis() {
            Some(expires_at) => (expires_at - self.clock.now().timestamp_millis()).max(0),
            None => 0,
        }
    }

    /// Destroy the session. Idempotent; clearing an empty session is a
    /// no-op.
    pub fn end_session(&self) {
        self.store.remove(TOKEN_KEY);
        self.store.remove(USER_KEY);
        self.store.remove(STARTED_AT_KEY);
        self.store.remove(EXPIRES_AT_KEY);
    }

    /// The stored user snapshot; `None` when absent or unparseable.
    pub fn current_user(&self) -> Option<UserSnapshot> {
        let raw = self.store.get(USER_KEY)?;
        serde_json::from_str(&raw).ok()
    }

    /// The stored role, if a readable snapshot exists.
    pub fn role(&self) -> Option<UserRole> {
        self.current_user().map(|user| user.role)
    }

    /// The stored bearer token, for attaching to outgoing requests.
    pub fn token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY)
    }

    /// Replace the stored snapshot after a profile refresh. Leaves the
    /// validity window untouched.
    pub fn refresh_user(&self, user: &UserSnapshot) {
        if let Ok(json) = serde_json::to_string(user) {
            self.store.set(USER_KEY, &json);
        }
    }

    fn expires_at_millis(&self) -> Option<i64> {
        self.store.get(EXPIRES_AT_KEY)?.parse().ok()
    }
}

/// Best-effort extraction of the `exp` claim from a JWT, in epoch
/// milliseconds. Any structural or decoding problem yields `None` —
/// the caller falls back to the configured duration.
fn decode_exp_millis(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = BASE64URL_NOPAD
        .decode(payload.trim_end_matches('=').as_bytes())
        .ok()?;
    let json: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = json.get("exp")?;
    let seconds = exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))?;
    Some(seconds * 1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::clock::ManualClock;
    use crate::session::store::MemoryStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
    }

    fn snapshot(role: UserRole) -> UserSnapshot {
        UserSnapshot {
            email: "budi@example.com".to_string(),
            role,
            avatar_url: None,
        }
    }

    fn manager_at(t: DateTime<Utc>) -> (SessionManager, Arc<ManualClock>, Arc<MemoryStore>) {
        let clock = Arc::new(ManualClock::at(t));
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::with_clock(store.clone(), clock.clone());
        (manager, clock, store)
    }

    /// Build a JWT-shaped token with the given payload JSON.
    fn token_with_payload(payload: &serde_json::Value) -> String {
        let header = BASE64URL_NOPAD.encode(b"{\"alg\":\"HS256\",\"typ\":\"JWT\"}");
        let body = BASE64URL_NOPAD.encode(payload.to_string().as_bytes());
        format!("{}.{}.signature", header, body)
    }

    #[test]
    fn test_valid_immediately_after_start() {
        let (manager, _, _) = manager_at(t0());
        manager.start_session(UserRole::User, "opaque-token", &snapshot(UserRole::User));
        assert!(manager.is_session_valid());
        assert!(manager.remaining_ms() > 0);
    }

    #[test]
    fn test_user_session_expires_after_60_minutes() {
        let (manager, clock, _) = manager_at(t0());
        manager.start_session(UserRole::User, "opaque-token", &snapshot(UserRole::User));

        clock.set(t0() + Duration::minutes(59));
        assert!(manager.is_session_valid());

        clock.set(t0() + Duration::minutes(61));
        assert!(!manager.is_session_valid());
        assert_eq!(manager.remaining_ms(), 0);
    }

    #[test]
    fn test_admin_session_lasts_120_minutes() {
        let (manager, clock, _) = manager_at(t0());
        manager.start_session(UserRole::Admin, "opaque-token", &snapshot(UserRole::Admin));

        clock.set(t0() + Duration::minutes(119));
        assert!(manager.is_session_valid());

        clock.set(t0() + Duration::minutes(121));
        assert!(!manager.is_session_valid());
    }

    #[test]
    fn test_token_exp_caps_the_window() {
        let (manager, clock, _) = manager_at(t0());
        // Token expires 30 minutes in, sooner than the 60-minute role
        // duration.
        let exp = (t0() + Duration::minutes(30)).timestamp();
        let token = token_with_payload(&serde_json::json!({ "sub": "budi", "exp": exp }));
        manager.start_session(UserRole::User, &token, &snapshot(UserRole::User));

        clock.set(t0() + Duration::minutes(29));
        assert!(manager.is_session_valid());
        clock.set(t0() + Duration::minutes(31));
        assert!(!manager.is_session_valid());
    }

    #[test]
    fn test_longer_token_exp_does_not_extend_window() {
        let (manager, clock, _) = manager_at(t0());
        let exp = (t0() + Duration::hours(24)).timestamp();
        let token = token_with_payload(&serde_json::json!({ "exp": exp }));
        manager.start_session(UserRole::User, &token, &snapshot(UserRole::User));

        clock.set(t0() + Duration::minutes(61));
        assert!(!manager.is_session_valid(), "role duration still caps the session");
    }

    #[test]
    fn test_undecodable_token_falls_back_to_role_duration() {
        let (manager, clock, _) = manager_at(t0());
        for token in ["no-dots", "a.%%%not-base64%%%.c", ""] {
            manager.start_session(UserRole::User, token, &snapshot(UserRole::User));
            clock.set(t0() + Duration::minutes(59));
            assert!(manager.is_session_valid(), "token {:?}", token);
            clock.set(t0());
        }
    }

    #[test]
    fn test_token_without_exp_claim_is_ignored() {
        let (manager, clock, _) = manager_at(t0());
        let token = token_with_payload(&serde_json::json!({ "sub": "budi" }));
        manager.start_session(UserRole::User, &token, &snapshot(UserRole::User));

        clock.set(t0() + Duration::minutes(59));
        assert!(manager.is_session_valid());
    }

    #[test]
    fn test_end_session_clears_everything() {
        let (manager, _, store) = manager_at(t0());
        manager.start_session(UserRole::User, "opaque-token", &snapshot(UserRole::User));

        manager.end_session();
        assert!(!manager.is_session_valid());
        assert!(manager.current_user().is_none());
        assert!(manager.token().is_none());
        assert!(store.get(STARTED_AT_KEY).is_none());
        assert!(store.get(EXPIRES_AT_KEY).is_none());
    }

    #[test]
    fn test_end_session_is_idempotent() {
        let (manager, _, _) = manager_at(t0());
        manager.start_session(UserRole::User, "opaque-token", &snapshot(UserRole::User));

        manager.end_session();
        manager.end_session();
        assert!(!manager.is_session_valid());
        assert!(manager.current_user().is_none());
    }

    #[test]
    fn test_no_session_reads_as_logged_out() {
        let (manager, _, _) = manager_at(t0());
        assert!(!manager.is_session_valid());
        assert_eq!(manager.remaining_ms(), 0);
        assert!(manager.current_user().is_none());
        assert!(manager.role().is_none());
    }

    #[test]
    fn test_corrupt_stored_state_degrades_to_no_session() {
        let (manager, _, store) = manager_at(t0());
        store.set(EXPIRES_AT_KEY, "not-a-number");
        store.set(USER_KEY, "{broken json");

        assert!(!manager.is_session_valid());
        assert_eq!(manager.remaining_ms(), 0);
        assert!(manager.current_user().is_none());
        assert!(manager.role().is_none());
    }

    #[test]
    fn test_refresh_user_keeps_expiry() {
        let (manager, _, store) = manager_at(t0());
        manager.start_session(UserRole::User, "opaque-token", &snapshot(UserRole::User));
        let expires_before = store.get(EXPIRES_AT_KEY);

        let mut updated = snapshot(UserRole::User);
        updated.avatar_url = Some("https://cdn.example.com/new.png".to_string());
        manager.refresh_user(&updated);

        assert_eq!(store.get(EXPIRES_AT_KEY), expires_before);
        assert_eq!(
            manager.current_user().unwrap().avatar_url.as_deref(),
            Some("https://cdn.example.com/new.png")
        );
    }

    #[test]
    fn test_restart_overwrites_previous_window() {
        let (manager, clock, _) = manager_at(t0());
        manager.start_session(UserRole::User, "first", &snapshot(UserRole::User));

        clock.set(t0() + Duration::minutes(30));
        manager.start_session(UserRole::User, "second", &snapshot(UserRole::User));

        // New window runs from the second start.
        clock.set(t0() + Duration::minutes(89));
        assert!(manager.is_session_valid());
        clock.set(t0() + Duration::minutes(91));
        assert!(!manager.is_session_valid());
    }
}
