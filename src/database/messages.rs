// ABOUTME: Direct message storage between two users
// ABOUTME: Threads page backwards by id and conversations summarise the latest message per partner
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use chrono::Utc;
use cpoint_core::errors::{AppError, AppResult};
use cpoint_core::models::{ConversationSummary, DirectMessage};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{execute_schema, format_timestamp, parse_timestamp, parse_uuid};

const MESSAGE_SELECT: &str = r"
    SELECT m.id, m.sender_id, m.receiver_id, m.message, m.image_path, m.is_read, m.created_at,
           s.username AS sender_username, r.username AS receiver_username
    FROM messages m
    JOIN users s ON s.id = m.sender_id
    JOIN users r ON r.id = m.receiver_id
";

/// Direct message database operations
pub struct MessageManager {
    pool: SqlitePool,
}

impl MessageManager {
    /// Create a new message manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the messages table
    ///
    /// # Errors
    ///
    /// Returns an error if a schema statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        execute_schema(
            &self.pool,
            &[
                r"
                CREATE TABLE IF NOT EXISTS messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    sender_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    receiver_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    message TEXT,
                    image_path TEXT,
                    is_read INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                )
                ",
                "CREATE INDEX IF NOT EXISTS idx_messages_pair ON messages(sender_id, receiver_id, id)",
                "CREATE INDEX IF NOT EXISTS idx_messages_unread ON messages(receiver_id, is_read)",
            ],
        )
        .await
    }

    /// Store a message
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn send(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        message: Option<&str>,
        image_path: Option<&str>,
    ) -> AppResult<DirectMessage> {
        let result = sqlx::query(
            r"
            INSERT INTO messages (sender_id, receiver_id, message, image_path, is_read, created_at)
            VALUES ($1, $2, $3, $4, 0, $5)
            ",
        )
        .bind(sender_id.to_string())
        .bind(receiver_id.to_string())
        .bind(message)
        .bind(image_path)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to send message: {e}")))?;

        self.get_message(result.last_insert_rowid())
            .await?
            .ok_or_else(|| AppError::internal("Message vanished after insert"))
    }

    /// Get a message by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_message(&self, message_id: i64) -> AppResult<Option<DirectMessage>> {
        let row = sqlx::query(&format!("{MESSAGE_SELECT} WHERE m.id = $1"))
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get message: {e}")))?;
        row.map(|r| Self::row_to_message(&r)).transpose()
    }

    /// Messages between two users older than `before_id`, returned oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn thread(
        &self,
        user_id: Uuid,
        partner_id: Uuid,
        before_id: Option<i64>,
        limit: i64,
    ) -> AppResult<Vec<DirectMessage>> {
        let rows = sqlx::query(&format!(
            r"{MESSAGE_SELECT}
            WHERE ((m.sender_id = $1 AND m.receiver_id = $2) OR (m.sender_id = $2 AND m.receiver_id = $1))
              AND ($3 IS NULL OR m.id < $3)
            ORDER BY m.id DESC
            LIMIT $4
            "
        ))
        .bind(user_id.to_string())
        .bind(partner_id.to_string())
        .bind(before_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to load conversation: {e}")))?;

        let mut messages = rows
            .iter()
            .map(Self::row_to_message)
            .collect::<AppResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    /// Mark every message from `partner_id` to `user_id` read
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn mark_thread_read(&self, user_id: Uuid, partner_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = 1 WHERE receiver_id = $1 AND sender_id = $2 AND is_read = 0",
        )
        .bind(user_id.to_string())
        .bind(partner_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to mark messages read: {e}")))?;
        Ok(result.rows_affected())
    }

    /// One summary per conversation partner, most recent conversation first
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn conversations(&self, user_id: Uuid) -> AppResult<Vec<ConversationSummary>> {
        let user = user_id.to_string();
        let rows = sqlx::query(
            r"
            SELECT partner_id, MAX(id) AS last_id
            FROM (
                SELECT CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END AS partner_id, id
                FROM messages
                WHERE sender_id = $1 OR receiver_id = $1
            )
            GROUP BY partner_id
            ORDER BY last_id DESC
            ",
        )
        .bind(&user)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list conversations: {e}")))?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let partner: String = row.get("partner_id");
            let last_id: i64 = row.get("last_id");

            let Some(last_message) = self.get_message(last_id).await? else {
                continue;
            };
            let partner_row = sqlx::query("SELECT username, profile_picture FROM users WHERE id = $1")
                .bind(&partner)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to load partner: {e}")))?;
            let unread_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM messages WHERE receiver_id = $1 AND sender_id = $2 AND is_read = 0",
            )
            .bind(&user)
            .bind(&partner)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count unread messages: {e}")))?;

            summaries.push(ConversationSummary {
                partner_username: partner_row.get("username"),
                partner_profile_picture: partner_row.get("profile_picture"),
                last_message,
                unread_count,
            });
        }
        Ok(summaries)
    }

    /// Unread messages addressed to a user
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE receiver_id = $1 AND is_read = 0")
            .bind(user_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count unread messages: {e}")))
    }

    /// Delete a message sent by `sender_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_message(&self, message_id: i64, sender_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1 AND sender_id = $2")
            .bind(message_id)
            .bind(sender_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete message: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_message(row: &SqliteRow) -> AppResult<DirectMessage> {
        let sender_id: String = row.get("sender_id");
        let receiver_id: String = row.get("receiver_id");
        let created_at: String = row.get("created_at");
        Ok(DirectMessage {
            id: row.get("id"),
            sender_id: parse_uuid(&sender_id)?,
            sender_username: row.get("sender_username"),
            receiver_id: parse_uuid(&receiver_id)?,
            receiver_username: row.get("receiver_username"),
            message: row.get("message"),
            image_path: row.get("image_path"),
            is_read: row.get::<i64, _>("is_read") != 0,
            created_at: parse_timestamp(&created_at)?,
        })
    }
}
