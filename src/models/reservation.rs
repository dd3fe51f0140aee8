//! Reservation model
//!
//! A reservation moves through a strict approval workflow:
//!
//! ```text
//! pending ──> confirmed   (admin)
//! pending ──> declined    (admin)
//! pending ──> cancelled   (owner)
//! declined ─> cancelled   (owner)
//! ```
//!
//! `confirmed` and `cancelled` are terminal. `can_transition_to` is the
//! single source of truth for this graph; the service layer and the
//! status-guarded SQL updates both defer to it.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Accepted party sizes.
pub const GUEST_COUNT_RANGE: RangeInclusive<i64> = 1..=20;

/// Bookable hourly slots, 09:00 through 18:00.
pub const SLOT_HOURS: RangeInclusive<u32> = 9..=18;

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Awaiting admin triage
    Pending,
    /// Approved by an admin; terminal
    Confirmed,
    /// Rejected by an admin; the owner may still cancel
    Declined,
    /// Retracted by the owner; terminal
    Cancelled,
}

impl ReservationStatus {
    /// Whether any further transition is permitted out of this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Cancelled)
    }

    /// Whether this status counts against the one-outstanding-reservation
    /// gate: a user holding a pending or declined reservation may not
    /// submit another until it is resolved.
    pub fn is_outstanding(self) -> bool {
        matches!(self, Self::Pending | Self::Declined)
    }

    /// The workflow edge check. Every status change in the system must
    /// pass through this predicate.
    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Declined)
                | (Self::Pending, Self::Cancelled)
                | (Self::Declined, Self::Cancelled)
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Declined => write!(f, "declined"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for ReservationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "declined" => Ok(Self::Declined),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid reservation status: {}", s)),
        }
    }
}

/// Reservation entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    /// Public identifier (UUID)
    pub id: String,
    /// Owning user
    pub user_id: i64,
    /// Guest name for the booking
    pub name: String,
    /// Contact phone number
    pub phone: String,
    /// Party size
    pub guests: i64,
    /// Booked date and slot time
    pub scheduled_at: DateTime<Utc>,
    /// Workflow status
    pub status: ReservationStatus,
    /// Whether the owner has seen the latest status change
    pub is_read_by_user: bool,
    /// Whether an admin has seen this reservation
    pub is_read_by_admin: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a reservation (before validation)
#[derive(Debug, Clone)]
pub struct CreateReservationInput {
    pub name: String,
    pub phone: String,
    pub guests: i64,
    pub scheduled_at: DateTime<Utc>,
}

impl CreateReservationInput {
    /// Validate the booking fields against a reference "now".
    ///
    /// Checks, in order: required fields, guest count range, the date
    /// component not being in the past, and the time falling on one of
    /// the fixed hourly slots.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name is required".to_string());
        }
        if self.phone.trim().is_empty() {
            return Err("Phone number is required".to_string());
        }
        if !GUEST_COUNT_RANGE.contains(&self.guests) {
            return Err(format!(
                "Guest count must be between {} and {}",
                GUEST_COUNT_RANGE.start(),
                GUEST_COUNT_RANGE.end()
            ));
        }
        if self.scheduled_at.date_naive() < now.date_naive() {
            return Err("Reservation date cannot be in the past".to_string());
        }
        if !is_slot_time(&self.scheduled_at) {
            return Err("Reservation time must be an hourly slot between 09:00 and 18:00".to_string());
        }
        Ok(())
    }
}

/// Whether a timestamp falls exactly on one of the bookable slots.
pub fn is_slot_time(at: &DateTime<Utc>) -> bool {
    SLOT_HOURS.contains(&at.hour()) && at.minute() == 0 && at.second() == 0
}

/// The full list of bookable slot hours, for clients rendering a picker.
pub fn slot_hours() -> impl Iterator<Item = u32> {
    SLOT_HOURS.into_iter()
}
