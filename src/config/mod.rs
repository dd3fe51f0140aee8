//! Configuration management
//!
//! Loads configuration for the kedai backend from a `config.yml` file.
//! Missing optional values are filled with sensible defaults, so a
//! missing file yields a fully usable development configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// SMTP configuration for OTP and confirmation mail
    #[serde(default)]
    pub email: EmailConfig,
    /// External messaging-client bridge configuration
    #[serde(default)]
    pub notifier: NotifierConfig,
}

impl Config {
    /// Load configuration from a YAML file, falling back to defaults
    /// when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin for the browser frontend
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path or URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/kedai.db".to_string()
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing bearer tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Access token lifetime in minutes
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
    /// OTP code lifetime in minutes
    #[serde(default = "default_otp_ttl_minutes")]
    pub otp_ttl_minutes: i64,
    /// Bootstrap admin email, created on first start when no admin exists
    #[serde(default)]
    pub bootstrap_admin_email: Option<String>,
    /// Bootstrap admin password
    #[serde(default)]
    pub bootstrap_admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_minutes: default_token_ttl_minutes(),
            otp_ttl_minutes: default_otp_ttl_minutes(),
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        }
    }
}

fn default_jwt_secret() -> String {
    // Development fallback; deployments must override in config.yml.
    "change-me-in-production".to_string()
}

fn default_token_ttl_minutes() -> i64 {
    60
}

fn default_otp_ttl_minutes() -> i64 {
    10
}

/// SMTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay host; empty disables outgoing mail
    #[serde(default)]
    pub smtp_host: String,
    /// SMTP port
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username
    #[serde(default)]
    pub smtp_username: String,
    /// SMTP password
    #[serde(default)]
    pub smtp_password: String,
    /// From address
    #[serde(default = "default_smtp_from")]
    pub from_address: String,
    /// From display name
    #[serde(default = "default_smtp_from_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: default_smtp_from(),
            from_name: default_smtp_from_name(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "noreply@kedai.local".to_string()
}

fn default_smtp_from_name() -> String {
    "Kedai".to_string()
}

/// External messaging-client bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Path to the external messaging client program
    #[serde(default = "default_notifier_program")]
    pub program: PathBuf,
    /// Per-command timeout in seconds. The client applies a fixed
    /// 5-second startup delay before processing any command, so this
    /// must stay comfortably above it.
    #[serde(default = "default_notifier_timeout_secs")]
    pub timeout_secs: u64,
    /// Disable outgoing notifications entirely
    #[serde(default)]
    pub disabled: bool,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            program: default_notifier_program(),
            timeout_secs: default_notifier_timeout_secs(),
            disabled: false,
        }
    }
}

fn default_notifier_program() -> PathBuf {
    PathBuf::from("bin/wa-client")
}

fn default_notifier_timeout_secs() -> u64 {
    30
}
