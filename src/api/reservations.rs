//! Reservation API endpoints
//!
//! Owner-facing:
//! - `POST /api/reservations/` — create (gate-checked)
//! - `GET /api/reservations/mine?page&size&status` — own list
//! - `PUT /api/reservations/{id}/cancel`
//! - `PUT /api/reservations/{id}/mark-read`
//! - `PUT /api/reservations/mark-all-read`
//! - `GET /api/reservations/unread-count`
//!
//! Moderation console (admin):
//! - `GET /api/reservations/?page&size&status`
//! - `PUT /api/reservations/{id}/confirm` / `{id}/decline`
//! - `DELETE /api/reservations/{id}`
//! - `PUT /api/reservations/admin/mark-all-read`
//! - `GET /api/reservations/admin/unread-count`

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::common::{ListQuery, Paginated, UnreadCount};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateReservationInput, Reservation};

/// Request body for creating a reservation
#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub name: String,
    pub phone: String,
    pub guests: i64,
    /// Booked date and slot time, ISO-8601
    pub date: DateTime<Utc>,
}

/// Response for bulk mark-read operations
#[derive(Debug, Serialize)]
pub struct UpdatedCount {
    pub updated_count: u64,
}

/// Routes for authenticated users
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/mine", get(list_mine))
        .route("/unread-count", get(unread_count))
        .route("/mark-all-read", put(mark_all_read))
        .route("/{id}/cancel", put(cancel))
        .route("/{id}/mark-read", put(mark_read))
}

/// Routes for the admin moderation console
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all))
        .route("/admin/mark-all-read", put(admin_mark_all_read))
        .route("/admin/unread-count", get(admin_unread_count))
        .route("/{id}/confirm", put(confirm))
        .route("/{id}/decline", put(decline))
        .route("/{id}", delete(remove))
}

/// POST /api/reservations/
async fn create(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<Json<Reservation>, ApiError> {
    let input = CreateReservationInput {
        name: req.name,
        phone: req.phone,
        guests: req.guests,
        scheduled_at: req.date,
    };
    let reservation = state.reservation_service.create(&user, input).await?;
    Ok(Json(reservation))
}

/// GET /api/reservations/mine
async fn list_mine(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<Reservation>>, ApiError> {
    let status = query.status_filter()?;
    let (page, size) = query.normalized();
    let (items, total) = state
        .reservation_service
        .list_mine(&user, status, page, size)
        .await?;
    Ok(Json(Paginated {
        items,
        page,
        size,
        total,
    }))
}

/// PUT /api/reservations/{id}/cancel
async fn cancel(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<Reservation>, ApiError> {
    let reservation = state.reservation_service.cancel(&id, &user).await?;
    Ok(Json(reservation))
}

/// PUT /api/reservations/{id}/mark-read
async fn mark_read(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<Reservation>, ApiError> {
    let reservation = state.reservation_service.mark_read(&id, &user).await?;
    Ok(Json(reservation))
}

/// PUT /api/reservations/mark-all-read
async fn mark_all_read(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<Json<UpdatedCount>, ApiError> {
    let updated_count = state.reservation_service.mark_all_read(&user).await?;
    Ok(Json(UpdatedCount { updated_count }))
}

/// GET /api/reservations/unread-count
async fn unread_count(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Result<Json<UnreadCount>, ApiError> {
    let count = state.reservation_service.unread_count_for_user(&user).await?;
    Ok(Json(UnreadCount { count }))
}

/// GET /api/reservations/
async fn list_all(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Paginated<Reservation>>, ApiError> {
    let status = query.status_filter()?;
    let (page, size) = query.normalized();
    let (items, total) = state.reservation_service.list_all(status, page, size).await?;
    Ok(Json(Paginated {
        items,
        page,
        size,
        total,
    }))
}

/// PUT /api/reservations/{id}/confirm
async fn confirm(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Reservation>, ApiError> {
    let reservation = state.reservation_service.confirm(&id).await?;
    Ok(Json(reservation))
}

/// PUT /api/reservations/{id}/decline
async fn decline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Reservation>, ApiError> {
    let reservation = state.reservation_service.decline(&id).await?;
    Ok(Json(reservation))
}

/// DELETE /api/reservations/{id}
async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.reservation_service.delete(&id).await?;
    Ok(Json(serde_json::json!({ "detail": "Deleted" })))
}

/// PUT /api/reservations/admin/mark-all-read
async fn admin_mark_all_read(
    State(state): State<AppState>,
) -> Result<Json<UpdatedCount>, ApiError> {
    let updated_count = state.reservation_service.mark_all_read_by_admin().await?;
    Ok(Json(UpdatedCount { updated_count }))
}

/// GET /api/reservations/admin/unread-count
async fn admin_unread_count(
    State(state): State<AppState>,
) -> Result<Json<UnreadCount>, ApiError> {
    let count = state.reservation_service.unread_count_for_admin().await?;
    Ok(Json(UnreadCount { count }))
}
