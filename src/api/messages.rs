//! Contact message API endpoints
//!
//! - `POST /api/messages/` — public contact-form submission
//! - `GET /api/messages/?unread_only` — admin inbox, newest first
//! - `PATCH /api/messages/{id}/read` — admin badge suppression
//! - `DELETE /api/messages/{id}` — admin delete
//! - `GET /api/messages/unread-count` — admin badge

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::UnreadCount;
use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreateMessageInput, Message};

/// Request body for the contact form
#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// Query parameters for the admin inbox
#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
}

/// Admin inbox response
#[derive(Debug, Serialize)]
pub struct InboxResponse {
    pub total: usize,
    pub messages: Vec<Message>,
}

/// Public routes
pub fn public_router() -> Router<AppState> {
    Router::new().route("/", post(create))
}

/// Admin routes
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/unread-count", get(unread_count))
        .route("/{id}/read", patch(mark_read))
        .route("/{id}", delete(remove))
}

/// POST /api/messages/
async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateMessageRequest>,
) -> Result<Json<Message>, ApiError> {
    let input = CreateMessageInput {
        name: req.name,
        email: req.email,
        subject: req.subject,
        body: req.message,
    };
    let message = state.message_service.create(input).await?;
    Ok(Json(message))
}

/// GET /api/messages/
async fn list(
    State(state): State<AppState>,
    Query(query): Query<InboxQuery>,
) -> Result<Json<InboxResponse>, ApiError> {
    let messages = state.message_service.list(query.unread_only).await?;
    Ok(Json(InboxResponse {
        total: messages.len(),
        messages,
    }))
}

/// PATCH /api/messages/{id}/read
async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>, ApiError> {
    let message = state.message_service.mark_read(&id).await?;
    Ok(Json(message))
}

/// DELETE /api/messages/{id}
async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.message_service.delete(&id).await?;
    Ok(Json(serde_json::json!({ "detail": "Deleted" })))
}

/// GET /api/messages/unread-count
async fn unread_count(State(state): State<AppState>) -> Result<Json<UnreadCount>, ApiError> {
    let count = state.message_service.unread_count().await?;
    Ok(Json(UnreadCount { count }))
}
