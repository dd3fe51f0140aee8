//! Client-side admission pre-check
//!
//! The fast, advisory half of the one-outstanding-reservation gate:
//! given the client's cached view of its own reservations, it refuses a
//! new submission while one is pending or declined, so the user gets an
//! immediate explanation instead of a round-trip rejection.
//!
//! This layer is UX convenience only. The server re-validates on every
//! create and remains the invariant's guardian; the two layers must
//! never be collapsed.

use crate::models::{Reservation, ReservationStatus};

/// Why a submission was refused locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateRefusal {
    /// ID of the blocking reservation.
    pub reservation_id: String,
    /// Its current status (pending or declined).
    pub status: ReservationStatus,
}

impl std::fmt::Display for GateRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "An existing reservation is still {}; resolve it before booking again",
            self.status
        )
    }
}

/// The first reservation that blocks a new submission, if any.
pub fn first_outstanding(reservations: &[Reservation]) -> Option<&Reservation> {
    reservations.iter().find(|r| r.status.is_outstanding())
}

/// Check whether a new reservation may be submitted.
pub fn check_can_submit(reservations: &[Reservation]) -> Result<(), GateRefusal> {
    match first_outstanding(reservations) {
        Some(blocking) => Err(GateRefusal {
            reservation_id: blocking.id.clone(),
            status: blocking.status,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reservation(id: &str, status: ReservationStatus) -> Reservation {
        let at = Utc.with_ymd_and_hms(2025, 2, 1, 18, 0, 0).unwrap();
        Reservation {
            id: id.to_string(),
            user_id: 1,
            name: "Budi".to_string(),
            phone: "0812".to_string(),
            guests: 2,
            scheduled_at: at,
            status,
            is_read_by_user: true,
            is_read_by_admin: false,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_empty_history_passes() {
        assert!(check_can_submit(&[]).is_ok());
    }

    #[test]
    fn test_resolved_history_passes() {
        let history = vec![
            reservation("r1", ReservationStatus::Confirmed),
            reservation("r2", ReservationStatus::Cancelled),
        ];
        assert!(check_can_submit(&history).is_ok());
    }

    #[test]
    fn test_pending_blocks_submission() {
        let history = vec![
            reservation("r1", ReservationStatus::Cancelled),
            reservation("r2", ReservationStatus::Pending),
        ];
        let refusal = check_can_submit(&history).unwrap_err();
        assert_eq!(refusal.reservation_id, "r2");
        assert_eq!(refusal.status, ReservationStatus::Pending);
    }

    #[test]
    fn test_declined_blocks_submission() {
        let history = vec![reservation("r1", ReservationStatus::Declined)];
        let refusal = check_can_submit(&history).unwrap_err();
        assert_eq!(refusal.status, ReservationStatus::Declined);
        assert!(refusal.to_string().contains("declined"));
    }
}
