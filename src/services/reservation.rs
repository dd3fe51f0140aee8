//! Reservation workflow engine
//!
//! Server-authoritative state machine for the booking lifecycle:
//! `pending → {confirmed, declined, cancelled}`, `declined → cancelled`,
//! with `confirmed` and `cancelled` terminal. Every mutation re-checks
//! its precondition here, and again in the guarded UPDATE, so a stale
//! request is rejected rather than silently merged.
//!
//! Admission control: a user may hold at most one reservation in an
//! outstanding (pending or declined) state. The check here gives a
//! friendly error; the partial unique index in the schema is the
//! backstop when two create requests race.
//!
//! Status changes that end-users care about (confirmed, declined) are
//! fanned out on a bounded broadcast channel. Subscribers hold their
//! own receiver for as long as they live; nothing global.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::db::repositories::reservation::NewReservation;
use crate::db::repositories::ReservationRepository;
use crate::models::{CreateReservationInput, Reservation, ReservationStatus, User};

/// Capacity of the event channel; slow subscribers lag and observe a
/// `RecvError::Lagged`, they never block a transition.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Error types for reservation operations
#[derive(Debug, Error)]
pub enum ReservationError {
    /// Invalid booking fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// The one-outstanding-reservation gate refused a new submission
    #[error("You already have an active reservation; resolve it before booking again")]
    OutstandingReservation,

    /// The requested transition is not an edge of the workflow graph,
    /// or the precondition was lost to a concurrent change
    #[error("Cannot move a {from} reservation to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    /// No reservation with the given ID
    #[error("Reservation not found")]
    NotFound,

    /// The caller does not own the reservation
    #[error("Not your reservation")]
    Forbidden,

    /// Database or infrastructure failure
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Status-change notifications for badge consumers and the notification
/// bridge.
#[derive(Debug, Clone)]
pub enum ReservationEvent {
    Confirmed(Reservation),
    Declined(Reservation),
}

/// Reservation service
pub struct ReservationService {
    repo: Arc<dyn ReservationRepository>,
    events: broadcast::Sender<ReservationEvent>,
}

impl ReservationService {
    pub fn new(repo: Arc<dyn ReservationRepository>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { repo, events }
    }

    /// Subscribe to confirmed/declined notifications. The subscription
    /// lives exactly as long as the returned receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<ReservationEvent> {
        self.events.subscribe()
    }

    /// Create a new reservation for the given user.
    ///
    /// Validates the booking fields, then enforces the admission gate.
    /// The created reservation is `pending` and flagged unread for the
    /// admin side; the creator's own read flag starts set.
    pub async fn create(
        &self,
        user: &User,
        input: CreateReservationInput,
    ) -> Result<Reservation, ReservationError> {
        input
            .validate(Utc::now())
            .map_err(ReservationError::Validation)?;

        let outstanding = self.repo.count_outstanding_for_user(user.id).await?;
        if outstanding > 0 {
            return Err(ReservationError::OutstandingReservation);
        }

        let new = NewReservation {
            user_id: user.id,
            name: input.name,
            phone: input.phone,
            guests: input.guests,
            scheduled_at: input.scheduled_at,
            is_read_by_user: true,
        };

        match self.repo.create(&new).await {
            Ok(reservation) => Ok(reservation),
            // Two creates raced past the count check; the partial unique
            // index caught the second one.
            Err(e) if is_unique_violation(&e) => Err(ReservationError::OutstandingReservation),
            Err(e) => Err(e.into()),
        }
    }

    /// Admin approval: `pending → confirmed`.
    pub async fn confirm(&self, id: &str) -> Result<Reservation, ReservationError> {
        let updated = self
            .apply_transition(id, ReservationStatus::Confirmed, true)
            .await?;
        let _ = self.events.send(ReservationEvent::Confirmed(updated.clone()));
        Ok(updated)
    }

    /// Admin rejection: `pending → declined`.
    pub async fn decline(&self, id: &str) -> Result<Reservation, ReservationError> {
        let updated = self
            .apply_transition(id, ReservationStatus::Declined, true)
            .await?;
        let _ = self.events.send(ReservationEvent::Declined(updated.clone()));
        Ok(updated)
    }

    /// Owner retraction: permitted from `pending` or `declined` only.
    pub async fn cancel(&self, id: &str, user: &User) -> Result<Reservation, ReservationError> {
        let existing = self.repo.get_by_id(id).await?.ok_or(ReservationError::NotFound)?;
        if existing.user_id != user.id {
            return Err(ReservationError::Forbidden);
        }
        self.apply_transition(id, ReservationStatus::Cancelled, false)
            .await
    }

    /// Admin hard delete, irrespective of status. Irreversible.
    pub async fn delete(&self, id: &str) -> Result<(), ReservationError> {
        if !self.repo.delete(id).await? {
            return Err(ReservationError::NotFound);
        }
        Ok(())
    }

    /// Owner marks a single status update as seen.
    pub async fn mark_read(&self, id: &str, user: &User) -> Result<Reservation, ReservationError> {
        let existing = self.repo.get_by_id(id).await?.ok_or(ReservationError::NotFound)?;
        if existing.user_id != user.id {
            return Err(ReservationError::Forbidden);
        }
        self.repo.mark_read_by_user(id).await?;
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(ReservationError::NotFound)
    }

    /// Owner clears their whole badge.
    pub async fn mark_all_read(&self, user: &User) -> Result<u64, ReservationError> {
        Ok(self.repo.mark_all_read_for_user(user.id).await?)
    }

    /// Admin clears the triage badge.
    pub async fn mark_all_read_by_admin(&self) -> Result<u64, ReservationError> {
        Ok(self.repo.mark_all_read_by_admin().await?)
    }

    /// A user's own reservations, newest first.
    pub async fn list_mine(
        &self,
        user: &User,
        status: Option<ReservationStatus>,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Reservation>, i64), ReservationError> {
        Ok(self.repo.list_for_user(user.id, status, page, per_page).await?)
    }

    /// All reservations for the moderation console, newest first.
    pub async fn list_all(
        &self,
        status: Option<ReservationStatus>,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Reservation>, i64), ReservationError> {
        Ok(self.repo.list_all(status, page, per_page).await?)
    }

    /// Reservations not yet triaged by an admin.
    pub async fn unread_count_for_admin(&self) -> Result<i64, ReservationError> {
        Ok(self.repo.unread_count_for_admin().await?)
    }

    /// Status updates the owner has not seen yet.
    pub async fn unread_count_for_user(&self, user: &User) -> Result<i64, ReservationError> {
        Ok(self.repo.unread_count_for_user(user.id).await?)
    }

    /// Shared transition path: check the edge against the current
    /// status, then apply the status-guarded update. A zero-row update
    /// means another actor moved the reservation first; report the
    /// then-current status in the error.
    async fn apply_transition(
        &self,
        id: &str,
        to: ReservationStatus,
        clear_user_read: bool,
    ) -> Result<Reservation, ReservationError> {
        let existing = self.repo.get_by_id(id).await?.ok_or(ReservationError::NotFound)?;

        if !existing.status.can_transition_to(to) {
            return Err(ReservationError::InvalidTransition {
                from: existing.status,
                to,
            });
        }

        let applied = self
            .repo
            .transition(id, existing.status, to, clear_user_read)
            .await?;

        if !applied {
            let current = self.repo.get_by_id(id).await?.ok_or(ReservationError::NotFound)?;
            return Err(ReservationError::InvalidTransition {
                from: current.status,
                to,
            });
        }

        self.repo
            .get_by_id(id)
            .await?
            .ok_or(ReservationError::NotFound)
    }
}

fn is_unique_violation(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}
