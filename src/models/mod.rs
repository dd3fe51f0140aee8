//! Data models
//!
//! This module defines the core entities of the kedai backend.

pub mod message;
pub mod reservation;
pub mod user;

pub use message::{CreateMessageInput, Message};
pub use reservation::{CreateReservationInput, Reservation, ReservationStatus};
pub use user::{User, UserRole, UserSnapshot};
