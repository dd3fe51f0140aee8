//! Reservation repository
//!
//! Status transitions are applied with status-guarded UPDATEs: the WHERE
//! clause re-checks the expected current status, so a transition whose
//! precondition was lost to a concurrent admin action affects zero rows
//! and is reported back as a stale precondition.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Reservation, ReservationStatus};

/// A reservation ready for insertion.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub user_id: i64,
    pub name: String,
    pub phone: String,
    pub guests: i64,
    pub scheduled_at: DateTime<Utc>,
    /// The creator has obviously seen their own reservation.
    pub is_read_by_user: bool,
}

/// Reservation repository trait
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Insert a new pending reservation
    async fn create(&self, input: &NewReservation) -> Result<Reservation>;

    /// Get a reservation by ID
    async fn get_by_id(&self, id: &str) -> Result<Option<Reservation>>;

    /// Number of reservations a user holds in an outstanding
    /// (pending or declined) state
    async fn count_outstanding_for_user(&self, user_id: i64) -> Result<i64>;

    /// Apply a status transition guarded on the expected current status.
    /// Returns false when the row no longer satisfies the precondition.
    async fn transition(
        &self,
        id: &str,
        from: ReservationStatus,
        to: ReservationStatus,
        clear_user_read: bool,
    ) -> Result<bool>;

    /// Permanently delete a reservation
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Mark a single reservation as read by its owner
    async fn mark_read_by_user(&self, id: &str) -> Result<bool>;

    /// Mark all of a user's reservations as read
    async fn mark_all_read_for_user(&self, user_id: i64) -> Result<u64>;

    /// Mark every reservation as read by the admin side
    async fn mark_all_read_by_admin(&self) -> Result<u64>;

    /// Paginated list of a user's reservations, newest first
    async fn list_for_user(
        &self,
        user_id: i64,
        status: Option<ReservationStatus>,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Reservation>, i64)>;

    /// Paginated list of all reservations, newest first
    async fn list_all(
        &self,
        status: Option<ReservationStatus>,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Reservation>, i64)>;

    /// Reservations not yet seen by an admin
    async fn unread_count_for_admin(&self) -> Result<i64>;

    /// Status updates not yet seen by a given owner
    async fn unread_count_for_user(&self, user_id: i64) -> Result<i64>;
}

/// sqlx-backed reservation repository
pub struct SqlxReservationRepository {
    pool: SqlitePool,
}

impl SqlxReservationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: SqlitePool) -> Arc<dyn ReservationRepository> {
        Arc::new(Self::new(pool))
    }
}

fn row_to_reservation(row: &sqlx::sqlite::SqliteRow) -> Reservation {
    Reservation {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        phone: row.get("phone"),
        guests: row.get("guests"),
        scheduled_at: row.get("scheduled_at"),
        status: row
            .get::<String, _>("status")
            .parse()
            .unwrap_or(ReservationStatus::Pending),
        is_read_by_user: row.get("is_read_by_user"),
        is_read_by_admin: row.get("is_read_by_admin"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl ReservationRepository for SqlxReservationRepository {
    async fn create(&self, input: &NewReservation) -> Result<Reservation> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"INSERT INTO reservations
               (id, user_id, name, phone, guests, scheduled_at, status, is_read_by_user, is_read_by_admin, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)"#,
        )
        .bind(&id)
        .bind(input.user_id)
        .bind(&input.name)
        .bind(&input.phone)
        .bind(input.guests)
        .bind(input.scheduled_at)
        .bind(ReservationStatus::Pending.to_string())
        .bind(input.is_read_by_user)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Reservation {
            id,
            user_id: input.user_id,
            name: input.name.clone(),
            phone: input.phone.clone(),
            guests: input.guests,
            scheduled_at: input.scheduled_at,
            status: ReservationStatus::Pending,
            is_read_by_user: input.is_read_by_user,
            is_read_by_admin: false,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Reservation>> {
        let row = sqlx::query("SELECT * FROM reservations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_reservation(&r)))
    }

    async fn count_outstanding_for_user(&self, user_id: i64) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM reservations WHERE user_id = ? AND status IN ('pending', 'declined')",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("count"))
    }

    async fn transition(
        &self,
        id: &str,
        from: ReservationStatus,
        to: ReservationStatus,
        clear_user_read: bool,
    ) -> Result<bool> {
        let query = if clear_user_read {
            r#"UPDATE reservations SET status = ?, is_read_by_user = 0, updated_at = ?
               WHERE id = ? AND status = ?"#
        } else {
            r#"UPDATE reservations SET status = ?, updated_at = ?
               WHERE id = ? AND status = ?"#
        };

        let result = sqlx::query(query)
            .bind(to.to_string())
            .bind(Utc::now())
            .bind(id)
            .bind(from.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_read_by_user(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE reservations SET is_read_by_user = 1, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read_for_user(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE reservations SET is_read_by_user = 1, updated_at = ? WHERE user_id = ? AND is_read_by_user = 0",
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn mark_all_read_by_admin(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE reservations SET is_read_by_admin = 1, updated_at = ? WHERE is_read_by_admin = 0",
        )
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        status: Option<ReservationStatus>,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Reservation>, i64)> {
        let offset = (page - 1) * per_page;

        let (rows, total_row) = match status {
            Some(status) => {
                let rows = sqlx::query(
                    r#"SELECT * FROM reservations WHERE user_id = ? AND status = ?
                       ORDER BY created_at DESC LIMIT ? OFFSET ?"#,
                )
                .bind(user_id)
                .bind(status.to_string())
                .bind(per_page)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total = sqlx::query(
                    "SELECT COUNT(*) as count FROM reservations WHERE user_id = ? AND status = ?",
                )
                .bind(user_id)
                .bind(status.to_string())
                .fetch_one(&self.pool)
                .await?;
                (rows, total)
            }
            None => {
                let rows = sqlx::query(
                    r#"SELECT * FROM reservations WHERE user_id = ?
                       ORDER BY created_at DESC LIMIT ? OFFSET ?"#,
                )
                .bind(user_id)
                .bind(per_page)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total = sqlx::query(
                    "SELECT COUNT(*) as count FROM reservations WHERE user_id = ?",
                )
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
                (rows, total)
            }
        };

        let items = rows.iter().map(row_to_reservation).collect();
        Ok((items, total_row.get("count")))
    }

    async fn list_all(
        &self,
        status: Option<ReservationStatus>,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Reservation>, i64)> {
        let offset = (page - 1) * per_page;

        let (rows, total_row) = match status {
            Some(status) => {
                let rows = sqlx::query(
                    r#"SELECT * FROM reservations WHERE status = ?
                       ORDER BY created_at DESC LIMIT ? OFFSET ?"#,
                )
                .bind(status.to_string())
                .bind(per_page)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total = sqlx::query(
                    "SELECT COUNT(*) as count FROM reservations WHERE status = ?",
                )
                .bind(status.to_string())
                .fetch_one(&self.pool)
                .await?;
                (rows, total)
            }
            None => {
                let rows = sqlx::query(
                    "SELECT * FROM reservations ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(per_page)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total = sqlx::query("SELECT COUNT(*) as count FROM reservations")
                    .fetch_one(&self.pool)
                    .await?;
                (rows, total)
            }
        };

        let items = rows.iter().map(row_to_reservation).collect();
        Ok((items, total_row.get("count")))
    }

    async fn unread_count_for_admin(&self) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM reservations WHERE is_read_by_admin = 0",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("count"))
    }

    async fn unread_count_for_user(&self, user_id: i64) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM reservations WHERE user_id = ? AND is_read_by_user = 0",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("count"))
    }
}
