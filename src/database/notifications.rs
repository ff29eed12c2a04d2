// ABOUTME: In-app notification storage and the poll/event reminder dedup logs
// ABOUTME: Creation upserts on (user, sender, type, post, community) with NULL-safe matching
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use chrono::{DateTime, Duration, Utc};
use cpoint_core::constants::limits::{
    NOTIFICATION_CHECK_LIMIT, NOTIFICATION_LIST_LIMIT, NOTIFICATION_RETENTION_DAYS,
};
use cpoint_core::errors::{AppError, AppResult};
use cpoint_core::models::{NewNotification, Notification};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::{execute_schema, format_timestamp, parse_timestamp, parse_uuid};

/// Notification database operations
pub struct NotificationManager {
    pool: SqlitePool,
}

impl NotificationManager {
    /// Create a new notification manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create notification tables
    ///
    /// # Errors
    ///
    /// Returns an error if a schema statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        execute_schema(
            &self.pool,
            &[
                r"
                CREATE TABLE IF NOT EXISTS notifications (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    from_user TEXT,
                    notification_type TEXT NOT NULL,
                    post_id INTEGER,
                    community_id INTEGER,
                    message TEXT NOT NULL,
                    link TEXT,
                    is_read INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS poll_notification_log (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    poll_id INTEGER NOT NULL REFERENCES polls(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    notification_type TEXT NOT NULL,
                    sent_at TEXT NOT NULL,
                    UNIQUE (poll_id, user_id, notification_type)
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS event_notification_log (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    event_id INTEGER NOT NULL REFERENCES calendar_events(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    notification_type TEXT NOT NULL,
                    sent_at TEXT NOT NULL,
                    UNIQUE (event_id, user_id, notification_type)
                )
                ",
                "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read, created_at)",
            ],
        )
        .await
    }

    /// Create or refresh a notification and return its id.
    ///
    /// An existing row with the same user, sender, type, post and community
    /// gets the new message, link and time and becomes unread again.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn create(&self, notification: &NewNotification) -> AppResult<i64> {
        let now = format_timestamp(Utc::now());
        let user = notification.user_id.to_string();

        let existing: Option<i64> = sqlx::query_scalar(
            r"
            SELECT id FROM notifications
            WHERE user_id = $1 AND from_user IS $2 AND notification_type = $3
              AND post_id IS $4 AND community_id IS $5
            ORDER BY id DESC
            LIMIT 1
            ",
        )
        .bind(&user)
        .bind(&notification.from_user)
        .bind(&notification.notification_type)
        .bind(notification.post_id)
        .bind(notification.community_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to look up notification: {e}")))?;

        if let Some(id) = existing {
            sqlx::query(
                "UPDATE notifications SET message = $2, link = $3, created_at = $4, is_read = 0 WHERE id = $1",
            )
            .bind(id)
            .bind(&notification.message)
            .bind(&notification.link)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to refresh notification: {e}")))?;
            debug!(notification_id = id, "Refreshed existing notification");
            return Ok(id);
        }

        let result = sqlx::query(
            r"
            INSERT INTO notifications (user_id, from_user, notification_type, post_id, community_id,
                                       message, link, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8)
            ",
        )
        .bind(&user)
        .bind(&notification.from_user)
        .bind(&notification.notification_type)
        .bind(notification.post_id)
        .bind(notification.community_id)
        .bind(&notification.message)
        .bind(&notification.link)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create notification: {e}")))?;
        Ok(result.last_insert_rowid())
    }

    /// Notifications of a user, newest first. Old read rows are purged first.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn list(&self, user_id: Uuid, include_read: bool) -> AppResult<Vec<Notification>> {
        self.purge_old_read(Utc::now()).await?;

        let rows = sqlx::query(
            r"
            SELECT * FROM notifications
            WHERE user_id = $1 AND ($2 = 1 OR is_read = 0)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            ",
        )
        .bind(user_id.to_string())
        .bind(i64::from(include_read))
        .bind(NOTIFICATION_LIST_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list notifications: {e}")))?;
        rows.iter().map(Self::row_to_notification).collect()
    }

    /// Delete read notifications older than the retention window
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn purge_old_read(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let cutoff = now - Duration::days(NOTIFICATION_RETENTION_DAYS);
        let result = sqlx::query("DELETE FROM notifications WHERE is_read = 1 AND created_at < $1")
            .bind(format_timestamp(cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to purge notifications: {e}")))?;
        Ok(result.rows_affected())
    }

    /// Unread notifications created after `since`, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn check_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM notifications
            WHERE user_id = $1 AND is_read = 0 AND created_at > $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            ",
        )
        .bind(user_id.to_string())
        .bind(format_timestamp(since))
        .bind(NOTIFICATION_CHECK_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to check notifications: {e}")))?;
        rows.iter().map(Self::row_to_notification).collect()
    }

    /// Mark one notification read; false when it does not belong to the user
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn mark_read(&self, notification_id: i64, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = $1 AND user_id = $2")
            .bind(notification_id)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to mark notification read: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark all notifications of a user read
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = $1 AND is_read = 0")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to mark notifications read: {e}")))?;
        Ok(result.rows_affected())
    }

    /// Delete every read notification of a user
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_read(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1 AND is_read = 1")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete notifications: {e}")))?;
        Ok(result.rows_affected())
    }

    /// Unread notifications of a user
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = 0")
            .bind(user_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count notifications: {e}")))
    }

    /// Insert one notification per recipient without upserting
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails
    pub async fn broadcast(
        &self,
        recipients: &[Uuid],
        notification_type: &str,
        message: &str,
        from_user: Option<&str>,
        link: Option<&str>,
    ) -> AppResult<usize> {
        let now = format_timestamp(Utc::now());
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        for user_id in recipients {
            sqlx::query(
                r"
                INSERT INTO notifications (user_id, from_user, notification_type, message, link, is_read, created_at)
                VALUES ($1, $2, $3, $4, $5, 0, $6)
                ",
            )
            .bind(user_id.to_string())
            .bind(from_user)
            .bind(notification_type)
            .bind(message)
            .bind(link)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to broadcast notification: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit broadcast: {e}")))?;
        Ok(recipients.len())
    }

    /// Claim a poll reminder slot; false when it was already sent
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn claim_poll_reminder(&self, poll_id: i64, user_id: Uuid, kind: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            INSERT OR IGNORE INTO poll_notification_log (poll_id, user_id, notification_type, sent_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(poll_id)
        .bind(user_id.to_string())
        .bind(kind)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to log poll reminder: {e}")))?;
        Ok(result.rows_affected() == 1)
    }

    /// Claim an event reminder slot; false when it was already sent
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn claim_event_reminder(
        &self,
        event_id: i64,
        user_id: Uuid,
        kind: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            INSERT OR IGNORE INTO event_notification_log (event_id, user_id, notification_type, sent_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(event_id)
        .bind(user_id.to_string())
        .bind(kind)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to log event reminder: {e}")))?;
        Ok(result.rows_affected() == 1)
    }

    fn row_to_notification(row: &SqliteRow) -> AppResult<Notification> {
        let user_id: String = row.get("user_id");
        let created_at: String = row.get("created_at");
        Ok(Notification {
            id: row.get("id"),
            user_id: parse_uuid(&user_id)?,
            from_user: row.get("from_user"),
            notification_type: row.get("notification_type"),
            post_id: row.get("post_id"),
            community_id: row.get("community_id"),
            message: row.get("message"),
            link: row.get("link"),
            is_read: row.get::<i64, _>("is_read") != 0,
            created_at: parse_timestamp(&created_at)?,
        })
    }
}
