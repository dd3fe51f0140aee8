//! API middleware
//!
//! Authentication (bearer token verification), admin authorization, the
//! shared application state, and the error envelope returned by every
//! endpoint.
//!
//! An authenticated call failing verification gets a plain 401 with the
//! `UNAUTHORIZED` code; clients treat that as an implicit
//! session-expiry signal, equivalent to the session watcher's forced
//! logout.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{User, UserRole};
use crate::services::message::MessageError;
use crate::services::reservation::ReservationError;
use crate::services::user::AuthError;
use crate::services::{AuthService, LoginRateLimiter, MessageService, ReservationService, TokenService};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub reservation_service: Arc<ReservationService>,
    pub message_service: Arc<MessageService>,
    pub token_service: TokenService,
    pub rate_limiter: Arc<LoginRateLimiter>,
}

/// Authenticated user extracted from the request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("RATE_LIMITED", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<ReservationError> for ApiError {
    fn from(error: ReservationError) -> Self {
        match &error {
            ReservationError::Validation(_) => Self::validation_error(error.to_string()),
            // Precondition violations: the gate and stale transitions
            // both surface as conflicts, never as silent merges.
            ReservationError::OutstandingReservation => Self::conflict(error.to_string()),
            ReservationError::InvalidTransition { .. } => Self::conflict(error.to_string()),
            ReservationError::NotFound => Self::not_found(error.to_string()),
            ReservationError::Forbidden => Self::forbidden(error.to_string()),
            ReservationError::Internal(e) => {
                tracing::error!(error = %e, "Reservation operation failed");
                Self::internal_error("Internal server error")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match &error {
            AuthError::Authentication(_) => Self::unauthorized(error.to_string()),
            AuthError::Validation(_) => Self::validation_error(error.to_string()),
            AuthError::UserExists => Self::conflict(error.to_string()),
            AuthError::NotFound => Self::not_found(error.to_string()),
            AuthError::Otp(_) => Self::validation_error(error.to_string()),
            AuthError::Internal(e) => {
                tracing::error!(error = %e, "Auth operation failed");
                Self::internal_error("Internal server error")
            }
        }
    }
}

impl From<MessageError> for ApiError {
    fn from(error: MessageError) -> Self {
        match &error {
            MessageError::Validation(_) => Self::validation_error(error.to_string()),
            MessageError::NotFound => Self::not_found(error.to_string()),
            MessageError::Internal(e) => {
                tracing::error!(error = %e, "Message operation failed");
                Self::internal_error("Internal server error")
            }
        }
    }
}

/// Extract the bearer token from the Authorization header.
fn extract_bearer_token(request: &Request) -> Option<String> {
    let auth_header = request.headers().get(header::AUTHORIZATION)?;
    let auth_str = auth_header.to_str().ok()?;
    auth_str.strip_prefix("Bearer ").map(|t| t.to_string())
}

/// Authentication middleware: verifies the bearer token and loads the
/// current account into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let claims = state
        .token_service
        .verify(&token)
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    let user = state
        .auth_service
        .user_by_email(&claims.sub)
        .await
        .map_err(|e| ApiError::internal_error(format!("Token validation failed: {}", e)))?
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Admin authorization middleware; must run inside `require_auth`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if user.0.role != UserRole::Admin {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}
