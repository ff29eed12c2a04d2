// ABOUTME: SQLite connection pool, schema migration and per-area database managers
// ABOUTME: Shared timestamp and id conversion helpers for row mapping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

//! # Database Management
//!
//! One `SqlitePool` is shared by a manager per functional area. Each manager
//! owns the schema of its tables and exposes async methods returning
//! [`AppResult`]. Timestamps are stored as UTC RFC 3339 text with millisecond
//! precision, which keeps lexical order equal to chronological order.

mod calendar;
mod communities;
mod group_chats;
mod messages;
mod notifications;
mod polls;
mod posts;
mod users;

pub use calendar::{parse_event_date, parse_event_time, CalendarManager, EventUpdate, NewEvent};
pub use communities::{CommunityManager, CommunityUpdate, NewCommunity, NewInvitation};
pub use group_chats::{GroupChatManager, LeaveOutcome};
pub use messages::MessageManager;
pub use notifications::NotificationManager;
pub use polls::{NewPoll, PollManager};
pub use posts::{NewPost, PostManager};
pub use users::{NewUser, ProfileUpdate, UserManager};

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use cpoint_core::errors::{AppError, AppResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::config::DatabaseUrl;

/// Database handle shared by all request handlers
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database, creating the file if needed, and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection fails, or a
    /// migration statement fails
    pub async fn new(database_url: &str) -> AppResult<Self> {
        let url = DatabaseUrl::parse_url(database_url)?;
        let options = SqliteConnectOptions::from_str(&url.to_connection_string())
            .map_err(|e| AppError::config(format!("Invalid database URL: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        // every connection to :memory: is a separate database, so keep exactly one alive
        let pool_options = if url.is_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to {url}: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;
        info!(database = %url, "Database ready");
        Ok(db)
    }

    /// Get a reference to the pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create every table and index
    ///
    /// # Errors
    ///
    /// Returns an error if a schema statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        self.users().migrate().await?;
        self.communities().migrate().await?;
        self.posts().migrate().await?;
        self.polls().migrate().await?;
        self.messages().migrate().await?;
        self.group_chats().migrate().await?;
        self.notifications().migrate().await?;
        self.calendar().migrate().await?;
        Ok(())
    }

    /// Round-trip query used by readiness checks
    ///
    /// # Errors
    ///
    /// Returns an error if the database does not answer
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Database ping failed: {e}")))?;
        Ok(())
    }

    /// Users, pending signups, remember tokens and login history
    #[must_use]
    pub fn users(&self) -> UserManager {
        UserManager::new(self.pool.clone())
    }

    /// Communities, memberships and invitations
    #[must_use]
    pub fn communities(&self) -> CommunityManager {
        CommunityManager::new(self.pool.clone())
    }

    /// Posts, replies and reactions
    #[must_use]
    pub fn posts(&self) -> PostManager {
        PostManager::new(self.pool.clone())
    }

    /// Polls, options and votes
    #[must_use]
    pub fn polls(&self) -> PollManager {
        PollManager::new(self.pool.clone())
    }

    /// Direct messages
    #[must_use]
    pub fn messages(&self) -> MessageManager {
        MessageManager::new(self.pool.clone())
    }

    /// Group chats
    #[must_use]
    pub fn group_chats(&self) -> GroupChatManager {
        GroupChatManager::new(self.pool.clone())
    }

    /// Notifications and reminder logs
    #[must_use]
    pub fn notifications(&self) -> NotificationManager {
        NotificationManager::new(self.pool.clone())
    }

    /// Calendar events, invitations and RSVPs
    #[must_use]
    pub fn calendar(&self) -> CalendarManager {
        CalendarManager::new(self.pool.clone())
    }
}

/// Run a list of schema statements in order
pub(crate) async fn execute_schema(pool: &SqlitePool, statements: &[&str]) -> AppResult<()> {
    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;
    }
    Ok(())
}

/// Storage format for timestamps
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp
pub(crate) fn parse_timestamp(raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid timestamp '{raw}': {e}")))
}

/// Parse an optional stored timestamp
pub(crate) fn parse_optional_timestamp(raw: Option<String>) -> AppResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_timestamp).transpose()
}

/// Parse a stored UUID
pub(crate) fn parse_uuid(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::database(format!("Invalid UUID '{raw}': {e}")))
}

/// Comma-separated placeholders `$start, $start+1, ...` for an `IN (...)` list
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
