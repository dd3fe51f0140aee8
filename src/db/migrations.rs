//! Database migrations
//!
//! Code-based migrations embedded as SQL strings for single-binary
//! deployment. Each migration has a unique sequential version; applied
//! versions are tracked in a `schema_migrations` table.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements
    pub up: &'static str,
}

/// All migrations for the kedai backend.
pub const MIGRATIONS: &[Migration] = &[
    // Migration 1: users
    Migration {
        version: 1,
        name: "create_users",
        up: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                phone VARCHAR(32) NOT NULL DEFAULT '',
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'user',
                avatar_url VARCHAR(255),
                email_verified BOOLEAN NOT NULL DEFAULT 0,
                otp_code VARCHAR(16),
                otp_expires_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
        "#,
    },
    // Migration 2: reservations
    // The partial unique index is the hard backstop for the
    // one-outstanding-reservation-per-user gate: a second pending or
    // declined row for the same user fails with a unique violation even
    // if two create requests race past the service-level check.
    Migration {
        version: 2,
        name: "create_reservations",
        up: r#"
            CREATE TABLE IF NOT EXISTS reservations (
                id VARCHAR(36) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                name VARCHAR(120) NOT NULL,
                phone VARCHAR(32) NOT NULL,
                guests INTEGER NOT NULL,
                scheduled_at TIMESTAMP NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                is_read_by_user BOOLEAN NOT NULL DEFAULT 0,
                is_read_by_admin BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_reservations_user_id ON reservations(user_id);
            CREATE INDEX IF NOT EXISTS idx_reservations_status ON reservations(status);
            CREATE INDEX IF NOT EXISTS idx_reservations_created_at ON reservations(created_at);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_reservations_one_outstanding
                ON reservations(user_id) WHERE status IN ('pending', 'declined');
        "#,
    },
    // Migration 3: contact messages
    Migration {
        version: 3,
        name: "create_messages",
        up: r#"
            CREATE TABLE IF NOT EXISTS messages (
                id VARCHAR(36) PRIMARY KEY,
                name VARCHAR(120) NOT NULL,
                email VARCHAR(255) NOT NULL,
                subject VARCHAR(255) NOT NULL,
                body TEXT NOT NULL,
                is_read BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_messages_is_read ON messages(is_read);
            CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages(created_at);
        "#,
    },
];

/// Run all pending migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create schema_migrations table")?;

    let applied: Vec<i32> = sqlx::query("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?
        .iter()
        .map(|row| row.get("version"))
        .collect();

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }

        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );

        // SQLite's execute handles one statement at a time; split on the
        // statement boundary.
        for statement in migration.up.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement)
                .execute(pool)
                .await
                .with_context(|| format!("Migration {} failed", migration.name))?;
        }

        sqlx::query("INSERT INTO schema_migrations (version, name) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to record migration {}", migration.name))?;
    }

    Ok(())
}
