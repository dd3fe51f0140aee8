//! Business logic services

pub mod email;
pub mod message;
pub mod notifier;
pub mod password;
pub mod rate_limiter;
pub mod reservation;
pub mod token;
pub mod user;

pub use email::EmailService;
pub use message::{MessageError, MessageService};
pub use notifier::Notifier;
pub use rate_limiter::LoginRateLimiter;
pub use reservation::{ReservationError, ReservationEvent, ReservationService};
pub use token::TokenService;
pub use user::{AuthError, AuthService};
