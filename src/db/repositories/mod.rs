//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles persistence for a specific entity.

pub mod message;
pub mod reservation;
pub mod user;

pub use message::{MessageRepository, SqlxMessageRepository};
pub use reservation::{ReservationRepository, SqlxReservationRepository};
pub use user::{SqlxUserRepository, UserRepository};
