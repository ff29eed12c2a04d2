// ABOUTME: Poll, option and vote storage
// ABOUTME: Single-vote polls replace the previous vote, multi-vote polls toggle options
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use chrono::{DateTime, Utc};
use cpoint_core::errors::{AppError, AppResult};
use cpoint_core::models::{Poll, PollOption};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{execute_schema, format_timestamp, parse_optional_timestamp, parse_timestamp, parse_uuid};

/// Fields needed to create a poll
#[derive(Debug, Clone)]
pub struct NewPoll {
    /// Creator
    pub created_by: Uuid,
    /// Question text
    pub question: String,
    /// Option texts in display order
    pub options: Vec<String>,
    /// One vote per user when true
    pub single_vote: bool,
    /// Optional deadline
    pub expires_at: Option<DateTime<Utc>>,
}

/// Poll database operations
pub struct PollManager {
    pool: SqlitePool,
}

impl PollManager {
    /// Create a new poll manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create poll tables
    ///
    /// # Errors
    ///
    /// Returns an error if a schema statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        execute_schema(
            &self.pool,
            &[
                r"
                CREATE TABLE IF NOT EXISTS polls (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                    community_id INTEGER NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
                    created_by TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    question TEXT NOT NULL,
                    single_vote INTEGER NOT NULL DEFAULT 1,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL,
                    expires_at TEXT
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS poll_options (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    poll_id INTEGER NOT NULL REFERENCES polls(id) ON DELETE CASCADE,
                    option_text TEXT NOT NULL,
                    position INTEGER NOT NULL DEFAULT 0
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS poll_votes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    poll_id INTEGER NOT NULL REFERENCES polls(id) ON DELETE CASCADE,
                    option_id INTEGER NOT NULL REFERENCES poll_options(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL,
                    UNIQUE (option_id, user_id)
                )
                ",
                "CREATE INDEX IF NOT EXISTS idx_polls_community ON polls(community_id, is_active)",
                "CREATE INDEX IF NOT EXISTS idx_poll_votes_poll ON poll_votes(poll_id, user_id)",
            ],
        )
        .await
    }

    /// Create a poll, its options and the feed post carrying it.
    ///
    /// All rows are written in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails; nothing is stored in that case
    pub async fn create_poll(&self, community_id: i64, new: &NewPoll) -> AppResult<Poll> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        let post_id = sqlx::query(
            r"
            INSERT INTO posts (community_id, author_id, content, image_path, created_at)
            VALUES ($1, $2, $3, NULL, $4)
            ",
        )
        .bind(community_id)
        .bind(new.created_by.to_string())
        .bind(&new.question)
        .bind(format_timestamp(now))
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to create poll post: {e}")))?
        .last_insert_rowid();

        let result = sqlx::query(
            r"
            INSERT INTO polls (post_id, community_id, created_by, question, single_vote, is_active,
                               created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, 1, $6, $7)
            ",
        )
        .bind(post_id)
        .bind(community_id)
        .bind(new.created_by.to_string())
        .bind(&new.question)
        .bind(i64::from(new.single_vote))
        .bind(format_timestamp(now))
        .bind(new.expires_at.map(format_timestamp))
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to create poll: {e}")))?;
        let poll_id = result.last_insert_rowid();

        for (position, text) in (0_i64..).zip(&new.options) {
            sqlx::query("INSERT INTO poll_options (poll_id, option_text, position) VALUES ($1, $2, $3)")
                .bind(poll_id)
                .bind(text)
                .bind(position)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::database(format!("Failed to create poll option: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit poll: {e}")))?;

        Ok(Poll {
            id: poll_id,
            post_id,
            community_id,
            created_by: new.created_by,
            question: new.question.clone(),
            single_vote: new.single_vote,
            is_active: true,
            created_at: now,
            expires_at: new.expires_at,
        })
    }

    /// Get a poll by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_poll(&self, poll_id: i64) -> AppResult<Option<Poll>> {
        let row = sqlx::query("SELECT * FROM polls WHERE id = $1")
            .bind(poll_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get poll: {e}")))?;
        row.map(|r| Self::row_to_poll(&r)).transpose()
    }

    /// Polls of a community, active first, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_community_polls(&self, community_id: i64) -> AppResult<Vec<Poll>> {
        let rows = sqlx::query(
            "SELECT * FROM polls WHERE community_id = $1 ORDER BY is_active DESC, created_at DESC, id DESC",
        )
        .bind(community_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list polls: {e}")))?;
        rows.iter().map(Self::row_to_poll).collect()
    }

    /// Options of a poll with their vote counts, in creation order
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn options_with_counts(&self, poll_id: i64) -> AppResult<Vec<PollOption>> {
        let rows = sqlx::query(
            r"
            SELECT o.id, o.poll_id, o.option_text, COUNT(v.id) AS votes
            FROM poll_options o
            LEFT JOIN poll_votes v ON v.option_id = o.id
            WHERE o.poll_id = $1
            GROUP BY o.id
            ORDER BY o.position, o.id
            ",
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get poll options: {e}")))?;

        Ok(rows
            .iter()
            .map(|row| PollOption {
                id: row.get("id"),
                poll_id: row.get("poll_id"),
                text: row.get("option_text"),
                votes: row.get("votes"),
            })
            .collect())
    }

    /// Option ids a user voted for in a poll
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn user_votes(&self, poll_id: i64, user_id: Uuid) -> AppResult<Vec<i64>> {
        sqlx::query_scalar(
            "SELECT option_id FROM poll_votes WHERE poll_id = $1 AND user_id = $2 ORDER BY option_id",
        )
        .bind(poll_id)
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get user votes: {e}")))
    }

    /// Record a vote and return the user's votes afterwards
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the option is not part of the poll, or an
    /// error if a query fails
    pub async fn vote(&self, poll: &Poll, option_id: i64, user_id: Uuid) -> AppResult<Vec<i64>> {
        let owner: Option<i64> = sqlx::query_scalar("SELECT poll_id FROM poll_options WHERE id = $1")
            .bind(option_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get poll option: {e}")))?;
        if owner != Some(poll.id) {
            return Err(AppError::not_found("Poll option"));
        }

        let user = user_id.to_string();
        let now = format_timestamp(Utc::now());

        if poll.single_vote {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;
            sqlx::query("DELETE FROM poll_votes WHERE poll_id = $1 AND user_id = $2")
                .bind(poll.id)
                .bind(&user)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::database(format!("Failed to clear vote: {e}")))?;
            sqlx::query(
                "INSERT INTO poll_votes (poll_id, option_id, user_id, created_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(poll.id)
            .bind(option_id)
            .bind(&user)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to record vote: {e}")))?;
            tx.commit()
                .await
                .map_err(|e| AppError::database(format!("Failed to commit vote: {e}")))?;
        } else {
            let removed = sqlx::query("DELETE FROM poll_votes WHERE option_id = $1 AND user_id = $2")
                .bind(option_id)
                .bind(&user)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to toggle vote: {e}")))?;
            if removed.rows_affected() == 0 {
                sqlx::query(
                    "INSERT INTO poll_votes (poll_id, option_id, user_id, created_at) VALUES ($1, $2, $3, $4)",
                )
                .bind(poll.id)
                .bind(option_id)
                .bind(&user)
                .bind(&now)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to record vote: {e}")))?;
            }
        }

        self.user_votes(poll.id, user_id).await
    }

    /// Distinct users who voted in a poll
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn voter_ids(&self, poll_id: i64) -> AppResult<Vec<Uuid>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT user_id FROM poll_votes WHERE poll_id = $1")
                .bind(poll_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to list voters: {e}")))?;
        ids.iter().map(|id| parse_uuid(id)).collect()
    }

    /// Number of distinct voters
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn total_voters(&self, poll_id: i64) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM poll_votes WHERE poll_id = $1")
            .bind(poll_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count voters: {e}")))
    }

    /// Close a poll
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn close_poll(&self, poll_id: i64) -> AppResult<()> {
        sqlx::query("UPDATE polls SET is_active = 0 WHERE id = $1")
            .bind(poll_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to close poll: {e}")))?;
        Ok(())
    }

    /// Deactivate active polls whose deadline has passed
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn deactivate_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE polls SET is_active = 0 WHERE is_active = 1 AND expires_at IS NOT NULL AND expires_at <= $1",
        )
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to expire polls: {e}")))?;
        Ok(result.rows_affected())
    }

    /// Active polls whose deadline lies in `(now, until]`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn closing_between(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Poll>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM polls
            WHERE is_active = 1 AND expires_at IS NOT NULL AND expires_at > $1 AND expires_at <= $2
            ORDER BY expires_at
            ",
        )
        .bind(format_timestamp(now))
        .bind(format_timestamp(until))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list closing polls: {e}")))?;
        rows.iter().map(Self::row_to_poll).collect()
    }

    /// Number of polls
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn count_polls(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM polls")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count polls: {e}")))
    }

    fn row_to_poll(row: &SqliteRow) -> AppResult<Poll> {
        let created_by: String = row.get("created_by");
        let created_at: String = row.get("created_at");
        Ok(Poll {
            id: row.get("id"),
            post_id: row.get("post_id"),
            community_id: row.get("community_id"),
            created_by: parse_uuid(&created_by)?,
            question: row.get("question"),
            single_vote: row.get::<i64, _>("single_vote") != 0,
            is_active: row.get::<i64, _>("is_active") != 0,
            created_at: parse_timestamp(&created_at)?,
            expires_at: parse_optional_timestamp(row.get("expires_at"))?,
        })
    }
}
