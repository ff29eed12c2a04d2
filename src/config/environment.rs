// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses ports, database URL, auth secrets, upload storage, mail and cron settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

//! Environment-based configuration

use std::env;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use cpoint_core::errors::{AppError, AppResult};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default HTTP port
const DEFAULT_HTTP_PORT: u16 = 8081;
/// Default upload body limit (16 MiB)
const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
/// Default bcrypt cost
const DEFAULT_BCRYPT_COST: u32 = 12;
/// Default session lifetime in hours
const DEFAULT_SESSION_EXPIRY_HOURS: i64 = 24;

/// Strongly typed log level configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational
    #[default]
    Info,
    /// Debugging
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        write!(f, "{s}")
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Type-safe database location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// `SQLite` database file
    SQLite {
        /// File path
        path: PathBuf,
    },
    /// In-memory `SQLite` (tests)
    Memory,
}

impl DatabaseUrl {
    /// Parse `sqlite:<path>`, `sqlite::memory:` or a bare file path
    ///
    /// # Errors
    ///
    /// Returns an error for empty input or a non-`SQLite` scheme
    pub fn parse_url(s: &str) -> AppResult<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AppError::config("DATABASE_URL is empty"));
        }
        if let Some(rest) = trimmed.strip_prefix("sqlite:") {
            let path = rest.trim_start_matches("//");
            return if path == ":memory:" {
                Ok(Self::Memory)
            } else {
                Ok(Self::SQLite {
                    path: PathBuf::from(path),
                })
            };
        }
        if trimmed.contains("://") {
            return Err(AppError::config(format!(
                "Unsupported database URL scheme: {trimmed}"
            )));
        }
        Ok(Self::SQLite {
            path: PathBuf::from(trimmed),
        })
    }

    /// Convert to a sqlx connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/cpoint.db"),
        }
    }
}

impl Display for DatabaseUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Session and password settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC key for session and verification tokens
    pub jwt_secret: String,
    /// Session lifetime in hours
    pub session_expiry_hours: i64,
    /// bcrypt cost factor
    pub bcrypt_cost: u32,
    /// Whether cookies carry the `Secure` attribute
    pub cookie_secure: bool,
}

/// Local upload storage
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Root directory; files land in `<dir>/<subfolder>/`
    pub directory: PathBuf,
    /// Request body limit for uploads
    pub max_bytes: usize,
}

/// Outgoing email via the Resend API
#[derive(Debug, Clone, Default)]
pub struct MailConfig {
    /// API key; email is only logged when unset
    pub resend_api_key: Option<String>,
    /// Sender address
    pub from_email: String,
}

/// Reminder scheduling and cron protection
#[derive(Debug, Clone, Default)]
pub struct ReminderConfig {
    /// Required `X-API-Key` for cron endpoints when set
    pub cron_api_key: Option<String>,
    /// In-process interval in seconds; zero disables it
    pub interval_secs: u64,
}

/// Superuser created at startup when all three values are present
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    /// Username
    pub username: String,
    /// Email
    pub email: String,
    /// Plain password, hashed on startup
    pub password: String,
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// HTTP port
    pub http_port: u16,
    /// Log level
    pub log_level: LogLevel,
    /// Deployment environment
    pub environment: Environment,
    /// Database location
    pub database_url: DatabaseUrl,
    /// Auth settings
    pub auth: AuthConfig,
    /// Upload settings
    pub uploads: UploadConfig,
    /// Base URL for links in emails and upload URLs
    pub public_base_url: String,
    /// Mail settings
    pub mail: MailConfig,
    /// Reminder settings
    pub reminders: ReminderConfig,
    /// Allowed CORS origins; `*` allows any
    pub cors_allowed_origins: Vec<String>,
    /// Optional superuser bootstrap
    pub admin_bootstrap: Option<AdminBootstrap>,
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    env_opt(key).map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|_| AppError::config(format!("Invalid {key} value: {raw}")))
    })
}

fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key).map_or(default, |v| {
        matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
    })
}

/// Random secret used when `JWT_SECRET` is not configured
fn ephemeral_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Split a comma-separated origin list
#[must_use]
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is present but cannot be parsed
    pub fn from_env() -> AppResult<Self> {
        info!("Loading configuration from environment variables");

        let http_port = env_parse("HTTP_PORT", DEFAULT_HTTP_PORT)?;
        let environment =
            Environment::from_str_or_default(&env_opt("ENVIRONMENT").unwrap_or_default());
        let database_url = match env_opt("DATABASE_URL") {
            Some(raw) => DatabaseUrl::parse_url(&raw)?,
            None => DatabaseUrl::default(),
        };

        let jwt_secret = env_opt("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set; sessions will not survive a restart");
            ephemeral_secret()
        });

        let admin_bootstrap = match (
            env_opt("ADMIN_USERNAME"),
            env_opt("ADMIN_EMAIL"),
            env_opt("ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(email), Some(password)) => Some(AdminBootstrap {
                username,
                email,
                password,
            }),
            _ => None,
        };

        let config = Self {
            host: env_opt("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            http_port,
            log_level: LogLevel::from_str_or_default(&env_opt("RUST_LOG").unwrap_or_default()),
            environment,
            database_url,
            auth: AuthConfig {
                jwt_secret,
                session_expiry_hours: env_parse(
                    "SESSION_EXPIRY_HOURS",
                    DEFAULT_SESSION_EXPIRY_HOURS,
                )?,
                bcrypt_cost: env_parse("BCRYPT_COST", DEFAULT_BCRYPT_COST)?,
                cookie_secure: env_bool("COOKIE_SECURE", true),
            },
            uploads: UploadConfig {
                directory: PathBuf::from(
                    env_opt("UPLOAD_DIR").unwrap_or_else(|| "./uploads".to_owned()),
                ),
                max_bytes: env_parse("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            },
            public_base_url: env_opt("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{http_port}"))
                .trim_end_matches('/')
                .to_owned(),
            mail: MailConfig {
                resend_api_key: env_opt("RESEND_API_KEY"),
                from_email: env_opt("RESEND_FROM_EMAIL")
                    .unwrap_or_else(|| "C-Point <no-reply@c-point.co>".to_owned()),
            },
            reminders: ReminderConfig {
                cron_api_key: env_opt("POLL_CRON_API_KEY"),
                interval_secs: env_parse("REMINDER_INTERVAL_SECS", 0)?,
            },
            cors_allowed_origins: parse_origins(
                &env_opt("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| "*".to_owned()),
            ),
            admin_bootstrap,
        };

        config.validate()?;
        Ok(config)
    }

    /// Configuration for tests: in-memory database, cheap hashing, no mail
    #[must_use]
    pub fn for_testing(upload_dir: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            http_port: 0,
            log_level: LogLevel::Warn,
            environment: Environment::Testing,
            database_url: DatabaseUrl::Memory,
            auth: AuthConfig {
                jwt_secret: "test-secret-for-cpoint-integration-tests".to_owned(),
                session_expiry_hours: DEFAULT_SESSION_EXPIRY_HOURS,
                bcrypt_cost: 4,
                cookie_secure: false,
            },
            uploads: UploadConfig {
                directory: upload_dir,
                max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            public_base_url: "http://localhost:8081".to_owned(),
            mail: MailConfig::default(),
            reminders: ReminderConfig::default(),
            cors_allowed_origins: vec!["*".to_owned()],
            admin_bootstrap: None,
        }
    }

    /// Validate cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns an error when a value is out of its accepted range
    pub fn validate(&self) -> AppResult<()> {
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(AppError::config("BCRYPT_COST must be between 4 and 31"));
        }
        if self.auth.session_expiry_hours <= 0 {
            return Err(AppError::config("SESSION_EXPIRY_HOURS must be positive"));
        }
        if self.environment.is_production() && !self.auth.cookie_secure {
            warn!("COOKIE_SECURE is disabled in production");
        }
        Ok(())
    }

    /// Summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "C-Point Server Configuration:\n\
             - HTTP: {}:{}\n\
             - Environment: {}\n\
             - Database: {}\n\
             - Uploads: {}\n\
             - Email delivery: {}\n\
             - Cron key: {}\n\
             - Reminder interval: {}s",
            self.host,
            self.http_port,
            self.environment,
            self.database_url,
            self.uploads.directory.display(),
            if self.mail.resend_api_key.is_some() {
                "Resend"
            } else {
                "log only"
            },
            if self.reminders.cron_api_key.is_some() {
                "required"
            } else {
                "open"
            },
            self.reminders.interval_secs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_parsing() {
        assert_eq!(DatabaseUrl::parse_url("sqlite::memory:").unwrap(), DatabaseUrl::Memory);
        assert_eq!(
            DatabaseUrl::parse_url("sqlite:./data/app.db").unwrap(),
            DatabaseUrl::SQLite {
                path: PathBuf::from("./data/app.db")
            }
        );
        assert!(DatabaseUrl::parse_url("postgres://localhost/db").is_err());
        assert!(DatabaseUrl::parse_url("  ").is_err());
    }

    #[test]
    fn test_enum_fallbacks() {
        assert_eq!(LogLevel::from_str_or_default("DEBUG"), LogLevel::Debug);
        assert_eq!(LogLevel::from_str_or_default("loud"), LogLevel::Info);
        assert_eq!(Environment::from_str_or_default("prod"), Environment::Production);
        assert_eq!(Environment::from_str_or_default("qa"), Environment::Development);
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://a.com, https://b.com,,"),
            vec!["https://a.com", "https://b.com"]
        );
    }

    #[test]
    fn test_testing_config_is_valid() {
        let config = ServerConfig::for_testing(PathBuf::from("/tmp/uploads"));
        assert!(config.validate().is_ok());
        assert!(config.database_url.is_memory());
    }
}
