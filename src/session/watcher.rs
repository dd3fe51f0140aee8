//! Session watcher
//!
//! Enforces session expiry centrally so individual views never poll on
//! their own. Two timers run from spawn:
//!
//! - a recurring poll (30 seconds by default) that asks the manager
//!   whether the session is still valid — this one is authoritative;
//! - a one-shot timer scheduled for `remaining_ms() + 1s`, re-checking
//!   right after the expected expiry instant. It is advisory only: if
//!   the session is still valid when it fires (e.g. it was restarted),
//!   it does nothing.
//!
//! The first observed valid→invalid transition is latched, so the
//! forced-logout path — end the session, emit one notice — fires
//! exactly once per watcher lifetime. Both timers are cancelled on
//! shutdown or drop.
//!
//! Polling rather than server push is a deliberate simplicity/latency
//! tradeoff: expiry is locally computable, and a 30-second detection
//! window is acceptable for a booking site.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::session::manager::SessionManager;

/// Default recurring poll interval.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Margin added to the one-shot timer past the expected expiry.
const DEADLINE_SLACK: Duration = Duration::from_secs(1);

/// User-visible notice emitted when the session is forced closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionNotice {
    /// The session expired; the caller should surface a message and
    /// navigate to the login entry point.
    Expired,
}

/// Watches a session manager and forces logout on expiry.
pub struct SessionWatcher {
    poll: JoinHandle<()>,
    deadline: Option<JoinHandle<()>>,
}

impl SessionWatcher {
    /// Start watching with the default poll interval.
    pub fn spawn(manager: Arc<SessionManager>, notices: mpsc::Sender<SessionNotice>) -> Self {
        Self::spawn_with_interval(manager, notices, POLL_INTERVAL)
    }

    /// Start watching with a custom poll interval (tests use short ones).
    pub fn spawn_with_interval(
        manager: Arc<SessionManager>,
        notices: mpsc::Sender<SessionNotice>,
        poll_every: Duration,
    ) -> Self {
        let latch = Arc::new(AtomicBool::new(false));

        let poll = {
            let manager = manager.clone();
            let notices = notices.clone();
            let latch = latch.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(poll_every);
                loop {
                    // First tick completes immediately: the initial
                    // check runs at mount, like every later one.
                    interval.tick().await;
                    check(&manager, &latch, &notices);
                }
            })
        };

        let deadline = {
            let remaining = manager.remaining_ms();
            if remaining > 0 {
                Some(tokio::spawn(async move {
                    tokio::time::sleep(
                        Duration::from_millis(remaining as u64) + DEADLINE_SLACK,
                    )
                    .await;
                    if manager.is_session_valid() {
                        // Session was renewed; the recurring poll stays
                        // authoritative.
                        return;
                    }
                    check(&manager, &latch, &notices);
                }))
            } else {
                None
            }
        };

        Self { poll, deadline }
    }

    /// Stop both timers.
    pub fn shutdown(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        self.poll.abort();
        if let Some(deadline) = self.deadline.take() {
            deadline.abort();
        }
    }
}

impl Drop for SessionWatcher {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Shared expiry check. Fires the forced-logout path at most once per
/// watcher lifetime; a missing role (nobody logged in, or already
/// logged out) never triggers it.
fn check(
    manager: &SessionManager,
    latch: &AtomicBool,
    notices: &mpsc::Sender<SessionNotice>,
) {
    if manager.is_session_valid() {
        return;
    }
    if manager.role().is_none() {
        return;
    }
    if latch.swap(true, Ordering::SeqCst) {
        return;
    }

    manager.end_session();
    if notices.try_send(SessionNotice::Expired).is_err() {
        tracing::warn!("Session expiry notice dropped: receiver unavailable");
    }
}
