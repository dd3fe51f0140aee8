//! Kedai - reservation and session backend for a café website

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kedai::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{SqlxMessageRepository, SqlxReservationRepository, SqlxUserRepository},
    },
    services::{
        notifier, AuthService, EmailService, LoginRateLimiter, MessageService, Notifier,
        ReservationService, TokenService,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kedai=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting kedai backend...");

    // Load configuration
    let config = Config::load(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.url);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let reservation_repo = SqlxReservationRepository::boxed(pool.clone());
    let message_repo = SqlxMessageRepository::boxed(pool.clone());

    // Initialize services
    let token_service = TokenService::new(&config.auth.jwt_secret, config.auth.token_ttl_minutes);
    let email_service = Arc::new(EmailService::new(config.email.clone()));
    let auth_service = Arc::new(AuthService::new(
        user_repo,
        token_service.clone(),
        email_service.clone(),
        &config.auth,
    ));
    let reservation_service = Arc::new(ReservationService::new(reservation_repo));
    let message_service = Arc::new(MessageService::new(message_repo));

    // Bootstrap admin account on first start, if configured
    if auth_service.ensure_bootstrap_admin(&config.auth).await? {
        tracing::info!("Bootstrap admin account created");
    }

    // Notification bridge: reservation outcomes go out through the
    // external messaging client
    {
        let bridge = Notifier::new(&config.notifier);
        let events = reservation_service.subscribe();
        tokio::spawn(notifier::run_event_loop(bridge, events));
    }

    // Confirmation emails follow the same event stream; failures are
    // logged and swallowed, as with the messaging bridge
    {
        let email_service = email_service.clone();
        let mut events = reservation_service.subscribe();
        let auth_service = auth_service.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(kedai::services::ReservationEvent::Confirmed(reservation)) => {
                        if !email_service.is_configured() {
                            continue;
                        }
                        let owner_email = match owner_email(&auth_service, reservation.user_id).await
                        {
                            Some(email) => email,
                            None => continue,
                        };
                        if let Err(e) = email_service
                            .send_reservation_confirmed(&owner_email, &reservation)
                            .await
                        {
                            tracing::warn!(reservation = %reservation.id, error = %e, "Failed to send confirmation email");
                        }
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Confirmation mailer lagged behind events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    // Build application state
    let rate_limiter = Arc::new(LoginRateLimiter::new());
    let state = AppState {
        auth_service,
        reservation_service,
        message_service,
        token_service,
        rate_limiter: rate_limiter.clone(),
    };

    // Rate limiter cleanup task (runs every 5 minutes)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.cleanup().await;
        }
    });

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Look up a reservation owner's email for outgoing mail.
async fn owner_email(auth_service: &AuthService, user_id: i64) -> Option<String> {
    match auth_service.user_by_id(user_id).await {
        Ok(Some(user)) => Some(user.email),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Failed to resolve reservation owner");
            None
        }
    }
}
