//! Client-held session core
//!
//! The pieces a client embeds to cooperate with the server: the session
//! manager (local credential lifecycle), the watcher (expiry
//! enforcement), and the advisory admission pre-check. The server never
//! holds a session object; it only validates the bearer credential per
//! request, so this module is the single place session state lives.

pub mod clock;
pub mod gate;
pub mod manager;
pub mod store;
pub mod watcher;

pub use clock::{Clock, SystemClock};
pub use gate::{check_can_submit, GateRefusal};
pub use manager::{role_session_minutes, SessionManager};
pub use store::{JsonFileStore, MemoryStore, SessionStore};
pub use watcher::{SessionNotice, SessionWatcher};
