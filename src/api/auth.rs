//! Authentication API endpoints
//!
//! - `POST /auth/user/login`, `POST /auth/admin/login` — form-encoded
//!   credentials, role-scoped entry points
//! - `POST /auth/user/register` — OTP-gated account provisioning
//! - `POST /auth/verify-otp`, `POST /auth/resend-otp`
//! - `GET /auth/me` — current account from the bearer token

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Form, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{UserRole, UserSnapshot};

/// Form body for the login endpoints. The username field carries the
/// account email.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Request body for registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub phone_number: String,
}

/// Request body for OTP verification
#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp_code: String,
}

/// Request body for OTP resend
#[derive(Debug, Deserialize)]
pub struct ResendOtpRequest {
    pub email: String,
}

/// Response for successful login
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: UserSnapshot,
}

/// Response carrying a human-readable outcome message
#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/user/login", post(user_login))
        .route("/admin/login", post(admin_login))
        .route("/user/register", post(register))
        .route("/verify-otp", post(verify_otp))
        .route("/resend-otp", post(resend_otp))
}

/// Build protected auth routes (require auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

/// POST /auth/user/login
async fn user_login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    login(state, form, Some(UserRole::User)).await
}

/// POST /auth/admin/login
async fn admin_login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    login(state, form, Some(UserRole::Admin)).await
}

async fn login(
    state: AppState,
    form: LoginForm,
    required_role: Option<UserRole>,
) -> Result<Json<TokenResponse>, ApiError> {
    if state.rate_limiter.is_limited(&form.username).await {
        return Err(ApiError::rate_limited(
            "Too many failed login attempts; try again later",
        ));
    }

    match state
        .auth_service
        .login(&form.username, &form.password, required_role)
        .await
    {
        Ok(outcome) => {
            state.rate_limiter.clear(&form.username).await;
            Ok(Json(TokenResponse {
                access_token: outcome.access_token,
                token_type: "bearer".to_string(),
                user: outcome.user,
            }))
        }
        Err(e) => {
            if matches!(e, crate::services::AuthError::Authentication(_)) {
                state.rate_limiter.record_failure(&form.username).await;
            }
            Err(e.into())
        }
    }
}

/// POST /auth/user/register
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<StatusMessage>, ApiError> {
    let email = state
        .auth_service
        .register(&req.email, &req.password, &req.phone_number)
        .await?;

    Ok(Json(StatusMessage {
        message: "Registration received; check your email for the verification code".to_string(),
        email: Some(email),
    }))
}

/// POST /auth/verify-otp
async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<StatusMessage>, ApiError> {
    state.auth_service.verify_otp(&req.email, &req.otp_code).await?;
    Ok(Json(StatusMessage {
        message: "Email verified; you can log in now".to_string(),
        email: None,
    }))
}

/// POST /auth/resend-otp
async fn resend_otp(
    State(state): State<AppState>,
    Json(req): Json<ResendOtpRequest>,
) -> Result<Json<StatusMessage>, ApiError> {
    state.auth_service.resend_otp(&req.email).await?;
    Ok(Json(StatusMessage {
        message: "A new verification code has been sent to your email".to_string(),
        email: None,
    }))
}

/// GET /auth/me
async fn me(
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Json<UserSnapshot> {
    Json(user.snapshot())
}
