//! API layer - HTTP handlers and routing
//!
//! Route groups:
//! - public: login/registration, contact-form submission
//! - protected: reservation operations for the owning user, `/auth/me`
//! - admin: the moderation console (list, confirm/decline, delete,
//!   badge management) behind `require_auth` + `require_admin`

pub mod auth;
pub mod common;
pub mod messages;
pub mod middleware;
pub mod reservations;

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::IntoMakeService,
    Router, ServiceExt,
};
use tower::Layer;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let protected_auth = auth::protected_router().route_layer(
        axum_middleware::from_fn_with_state(state.clone(), middleware::require_auth),
    );

    let user_reservations = reservations::router().route_layer(
        axum_middleware::from_fn_with_state(state.clone(), middleware::require_auth),
    );
    let admin_reservations = reservations::admin_router()
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let admin_messages = messages::admin_router()
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .nest("/auth", auth::public_router().merge(protected_auth))
        .nest(
            "/api/reservations",
            user_reservations.merge(admin_reservations),
        )
        .nest(
            "/api/messages",
            messages::public_router().merge(admin_messages),
        )
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> IntoMakeService<NormalizePath<Router>> {
    let cors = CorsLayer::new()
        .allow_origin(
            cors_origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000")),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let router = build_api_router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // Nested collection routes are registered at `/` (e.g. `/api/reservations/`);
    // under axum's nesting rules those only match the bare prefix, so trim a
    // trailing slash before routing to keep the documented `/…/` paths reachable.
    let normalized = NormalizePathLayer::trim_trailing_slash().layer(router);
    ServiceExt::<Request>::into_make_service(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, EmailConfig};
    use crate::db::repositories::{
        SqlxMessageRepository, SqlxReservationRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::services::{
        AuthService, EmailService, LoginRateLimiter, MessageService, ReservationService,
        TokenService,
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use chrono::{Datelike, Duration, Utc};
    use serde_json::json;
    use sqlx::{Row, SqlitePool};
    use std::sync::Arc;

    async fn test_server() -> (TestServer, SqlitePool) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        let auth_config = AuthConfig {
            jwt_secret: "test-secret".to_string(),
            bootstrap_admin_email: Some("admin@kedai.test".to_string()),
            bootstrap_admin_password: Some("rahasia-admin".to_string()),
            ..AuthConfig::default()
        };

        let token_service = TokenService::new(&auth_config.jwt_secret, auth_config.token_ttl_minutes);
        let email_service = Arc::new(EmailService::new(EmailConfig::default()));
        let auth_service = Arc::new(AuthService::new(
            SqlxUserRepository::boxed(pool.clone()),
            token_service.clone(),
            email_service,
            &auth_config,
        ));
        auth_service.ensure_bootstrap_admin(&auth_config).await.unwrap();

        let state = AppState {
            auth_service,
            reservation_service: Arc::new(ReservationService::new(
                SqlxReservationRepository::boxed(pool.clone()),
            )),
            message_service: Arc::new(MessageService::new(SqlxMessageRepository::boxed(
                pool.clone(),
            ))),
            token_service,
            rate_limiter: Arc::new(LoginRateLimiter::new()),
        };

        let app = build_router(state, "http://localhost:3000");
        (TestServer::new(app).unwrap(), pool)
    }

    /// Register + verify a user account directly (registration's OTP
    /// email cannot be sent in tests), then log in over HTTP.
    async fn login_user(server: &TestServer, pool: &SqlitePool, email: &str) -> String {
        let _ = server
            .post("/auth/user/register")
            .json(&json!({ "email": email, "password": "kopi-susu", "phone_number": "0812" }))
            .await;

        let row = sqlx::query("SELECT otp_code FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(pool)
            .await
            .unwrap();
        let otp: String = row.get::<Option<String>, _>("otp_code").unwrap();

        server
            .post("/auth/verify-otp")
            .json(&json!({ "email": email, "otp_code": otp }))
            .await
            .assert_status_ok();

        let response = server
            .post("/auth/user/login")
            .form(&json!({ "username": email, "password": "kopi-susu" }))
            .await;
        response.assert_status_ok();
        response.json::<serde_json::Value>()["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn login_admin(server: &TestServer) -> String {
        let response = server
            .post("/auth/admin/login")
            .form(&json!({ "username": "admin@kedai.test", "password": "rahasia-admin" }))
            .await;
        response.assert_status_ok();
        response.json::<serde_json::Value>()["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    fn bearer(token: &str) -> (axum::http::HeaderName, axum::http::HeaderValue) {
        (
            header::AUTHORIZATION,
            format!("Bearer {}", token).parse().unwrap(),
        )
    }

    fn booking_body() -> serde_json::Value {
        let tomorrow = Utc::now().date_naive() + Duration::days(1);
        json!({
            "name": "Budi",
            "phone": "081234567890",
            "guests": 4,
            "date": format!(
                "{:04}-{:02}-{:02}T18:00:00Z",
                tomorrow.year(),
                tomorrow.month(),
                tomorrow.day()
            ),
        })
    }

    #[tokio::test]
    async fn test_login_returns_token_and_snapshot() {
        let (server, _pool) = test_server().await;
        let response = server
            .post("/auth/admin/login")
            .form(&json!({ "username": "admin@kedai.test", "password": "rahasia-admin" }))
            .await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        assert_eq!(body["token_type"], "bearer");
        assert_eq!(body["user"]["email"], "admin@kedai.test");
        assert_eq!(body["user"]["role"], "admin");
    }

    #[tokio::test]
    async fn test_admin_login_refuses_user_account() {
        let (server, pool) = test_server().await;
        login_user(&server, &pool, "budi@kedai.test").await;

        let response = server
            .post("/auth/admin/login")
            .form(&json!({ "username": "budi@kedai.test", "password": "kopi-susu" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_lockout_after_repeated_failures() {
        let (server, _pool) = test_server().await;
        for _ in 0..5 {
            let response = server
                .post("/auth/admin/login")
                .form(&json!({ "username": "admin@kedai.test", "password": "wrong" }))
                .await;
            assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        }

        let response = server
            .post("/auth/admin/login")
            .form(&json!({ "username": "admin@kedai.test", "password": "rahasia-admin" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let (server, pool) = test_server().await;
        let response = server.get("/auth/me").await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

        let token = login_user(&server, &pool, "budi@kedai.test").await;
        let response = server.get("/auth/me").add_header(bearer(&token).0, bearer(&token).1).await;
        response.assert_status_ok();
        assert_eq!(response.json::<serde_json::Value>()["email"], "budi@kedai.test");
    }

    #[tokio::test]
    async fn test_reservation_create_confirm_cancel_flow() {
        let (server, pool) = test_server().await;
        let user_token = login_user(&server, &pool, "budi@kedai.test").await;
        let admin_token = login_admin(&server).await;

        // Create
        let response = server
            .post("/api/reservations/")
            .add_header(bearer(&user_token).0, bearer(&user_token).1)
            .json(&booking_body())
            .await;
        response.assert_status_ok();
        let reservation: serde_json::Value = response.json();
        assert_eq!(reservation["status"], "pending");
        let id = reservation["id"].as_str().unwrap().to_string();

        // Admin confirms
        let response = server
            .put(&format!("/api/reservations/{}/confirm", id))
            .add_header(bearer(&admin_token).0, bearer(&admin_token).1)
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<serde_json::Value>()["status"], "confirmed");

        // Owner cannot retract a confirmed booking
        let response = server
            .put(&format!("/api/reservations/{}/cancel", id))
            .add_header(bearer(&user_token).0, bearer(&user_token).1)
            .await;
        assert_eq!(response.status_code(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_gate_conflict_on_double_submit() {
        let (server, pool) = test_server().await;
        let user_token = login_user(&server, &pool, "budi@kedai.test").await;

        server
            .post("/api/reservations/")
            .add_header(bearer(&user_token).0, bearer(&user_token).1)
            .json(&booking_body())
            .await
            .assert_status_ok();

        let response = server
            .post("/api/reservations/")
            .add_header(bearer(&user_token).0, bearer(&user_token).1)
            .json(&booking_body())
            .await;
        assert_eq!(response.status_code(), StatusCode::CONFLICT);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_double_decline_is_conflict() {
        let (server, pool) = test_server().await;
        let user_token = login_user(&server, &pool, "budi@kedai.test").await;
        let admin_token = login_admin(&server).await;

        let response = server
            .post("/api/reservations/")
            .add_header(bearer(&user_token).0, bearer(&user_token).1)
            .json(&booking_body())
            .await;
        let id = response.json::<serde_json::Value>()["id"]
            .as_str()
            .unwrap()
            .to_string();

        server
            .put(&format!("/api/reservations/{}/decline", id))
            .add_header(bearer(&admin_token).0, bearer(&admin_token).1)
            .await
            .assert_status_ok();

        let response = server
            .put(&format!("/api/reservations/{}/decline", id))
            .add_header(bearer(&admin_token).0, bearer(&admin_token).1)
            .await;
        assert_eq!(response.status_code(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_validation_rejected_before_gate() {
        let (server, pool) = test_server().await;
        let user_token = login_user(&server, &pool, "budi@kedai.test").await;

        let mut body = booking_body();
        body["guests"] = json!(50);
        let response = server
            .post("/api/reservations/")
            .add_header(bearer(&user_token).0, bearer(&user_token).1)
            .json(&body)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_routes_forbidden_for_users() {
        let (server, pool) = test_server().await;
        let user_token = login_user(&server, &pool, "budi@kedai.test").await;

        let response = server
            .get("/api/reservations/")
            .add_header(bearer(&user_token).0, bearer(&user_token).1)
            .await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

        let response = server
            .get("/api/messages/")
            .add_header(bearer(&user_token).0, bearer(&user_token).1)
            .await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_list_and_badges() {
        let (server, pool) = test_server().await;
        let user_token = login_user(&server, &pool, "budi@kedai.test").await;
        let admin_token = login_admin(&server).await;

        server
            .post("/api/reservations/")
            .add_header(bearer(&user_token).0, bearer(&user_token).1)
            .json(&booking_body())
            .await
            .assert_status_ok();

        let response = server
            .get("/api/reservations/?page=1&size=10")
            .add_header(bearer(&admin_token).0, bearer(&admin_token).1)
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["status"], "pending");

        let response = server
            .get("/api/reservations/admin/unread-count")
            .add_header(bearer(&admin_token).0, bearer(&admin_token).1)
            .await;
        assert_eq!(response.json::<serde_json::Value>()["count"], 1);

        server
            .put("/api/reservations/admin/mark-all-read")
            .add_header(bearer(&admin_token).0, bearer(&admin_token).1)
            .await
            .assert_status_ok();

        let response = server
            .get("/api/reservations/admin/unread-count")
            .add_header(bearer(&admin_token).0, bearer(&admin_token).1)
            .await;
        assert_eq!(response.json::<serde_json::Value>()["count"], 0);
    }

    #[tokio::test]
    async fn test_contact_form_is_public_and_feeds_admin_inbox() {
        let (server, _pool) = test_server().await;

        let response = server
            .post("/api/messages/")
            .json(&json!({
                "name": "Siti",
                "email": "siti@example.com",
                "subject": "Group booking",
                "message": "Do you take groups of 15?",
            }))
            .await;
        response.assert_status_ok();

        let admin_token = login_admin(&server).await;
        let response = server
            .get("/api/messages/?unread_only=true")
            .add_header(bearer(&admin_token).0, bearer(&admin_token).1)
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["total"], 1);
        assert_eq!(body["messages"][0]["subject"], "Group booking");
    }

    #[tokio::test]
    async fn test_unknown_status_filter_is_rejected() {
        let (server, _pool) = test_server().await;
        let admin_token = login_admin(&server).await;

        let response = server
            .get("/api/reservations/?status=approved")
            .add_header(bearer(&admin_token).0, bearer(&admin_token).1)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }
}
