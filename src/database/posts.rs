// ABOUTME: Post, reply and reaction storage with cursor-paged community feeds
// ABOUTME: Reactions toggle per user: same type removes, different type replaces
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use chrono::{DateTime, Utc};
use cpoint_core::errors::{AppError, AppResult};
use cpoint_core::models::{Post, ReactionChange, ReactionSummary, ReactionTarget, Reply};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{execute_schema, format_timestamp, parse_optional_timestamp, parse_timestamp, parse_uuid};

/// Fields needed to create a post or reply
#[derive(Debug, Clone)]
pub struct NewPost {
    /// Author
    pub author_id: Uuid,
    /// Text body, may be empty when an image is attached
    pub content: String,
    /// Upload reference
    pub image_path: Option<String>,
}

/// Post, reply and reaction database operations
pub struct PostManager {
    pool: SqlitePool,
}

impl PostManager {
    /// Create a new post manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create post tables
    ///
    /// # Errors
    ///
    /// Returns an error if a schema statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        execute_schema(
            &self.pool,
            &[
                r"
                CREATE TABLE IF NOT EXISTS posts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    community_id INTEGER NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
                    author_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    content TEXT NOT NULL DEFAULT '',
                    image_path TEXT,
                    created_at TEXT NOT NULL,
                    edited_at TEXT
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS replies (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                    author_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    content TEXT NOT NULL DEFAULT '',
                    image_path TEXT,
                    created_at TEXT NOT NULL
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS reactions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    reaction_type TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    UNIQUE (post_id, user_id)
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS reply_reactions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    reply_id INTEGER NOT NULL REFERENCES replies(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    reaction_type TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    UNIQUE (reply_id, user_id)
                )
                ",
                "CREATE INDEX IF NOT EXISTS idx_posts_feed ON posts(community_id, created_at DESC, id DESC)",
                "CREATE INDEX IF NOT EXISTS idx_replies_post ON replies(post_id, created_at)",
            ],
        )
        .await
    }

    // ========================================================================
    // Posts
    // ========================================================================

    /// Create a post in a community
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn create_post(&self, community_id: i64, new: &NewPost) -> AppResult<Post> {
        let now = Utc::now();
        let result = sqlx::query(
            r"
            INSERT INTO posts (community_id, author_id, content, image_path, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(community_id)
        .bind(new.author_id.to_string())
        .bind(&new.content)
        .bind(&new.image_path)
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create post: {e}")))?;

        self.get_post(result.last_insert_rowid())
            .await?
            .ok_or_else(|| AppError::internal("Post vanished after insert"))
    }

    /// Get a post by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_post(&self, post_id: i64) -> AppResult<Option<Post>> {
        let row = sqlx::query(
            r"
            SELECT p.*, u.username AS author_username
            FROM posts p JOIN users u ON u.id = p.author_id
            WHERE p.id = $1
            ",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get post: {e}")))?;
        row.map(|r| Self::row_to_post(&r)).transpose()
    }

    /// Replace the content of a post and stamp `edited_at`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn update_post_content(&self, post_id: i64, content: &str) -> AppResult<()> {
        sqlx::query("UPDATE posts SET content = $2, edited_at = $3 WHERE id = $1")
            .bind(post_id)
            .bind(content)
            .bind(format_timestamp(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to update post: {e}")))?;
        Ok(())
    }

    /// Delete a post with its replies and reactions
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_post(&self, post_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete post: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    /// Newest-first feed page; fetch `limit + 1` rows to detect more pages
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_feed(
        &self,
        community_id: i64,
        before: Option<(DateTime<Utc>, i64)>,
        fetch: i64,
    ) -> AppResult<Vec<Post>> {
        let rows = if let Some((created_at, id)) = before {
            sqlx::query(
                r"
                SELECT p.*, u.username AS author_username
                FROM posts p JOIN users u ON u.id = p.author_id
                WHERE p.community_id = $1
                  AND (p.created_at < $2 OR (p.created_at = $2 AND p.id < $3))
                ORDER BY p.created_at DESC, p.id DESC
                LIMIT $4
                ",
            )
            .bind(community_id)
            .bind(format_timestamp(created_at))
            .bind(id)
            .bind(fetch)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query(
                r"
                SELECT p.*, u.username AS author_username
                FROM posts p JOIN users u ON u.id = p.author_id
                WHERE p.community_id = $1
                ORDER BY p.created_at DESC, p.id DESC
                LIMIT $2
                ",
            )
            .bind(community_id)
            .bind(fetch)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::database(format!("Failed to list posts: {e}")))?;

        rows.iter().map(Self::row_to_post).collect()
    }

    /// Number of posts
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn count_posts(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count posts: {e}")))
    }

    fn row_to_post(row: &SqliteRow) -> AppResult<Post> {
        let author_id: String = row.get("author_id");
        let created_at: String = row.get("created_at");
        Ok(Post {
            id: row.get("id"),
            community_id: row.get("community_id"),
            author_id: parse_uuid(&author_id)?,
            author_username: row.get("author_username"),
            content: row.get("content"),
            image_path: row.get("image_path"),
            created_at: parse_timestamp(&created_at)?,
            edited_at: parse_optional_timestamp(row.get("edited_at"))?,
        })
    }

    // ========================================================================
    // Replies
    // ========================================================================

    /// Reply to a post
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn create_reply(&self, post_id: i64, new: &NewPost) -> AppResult<Reply> {
        let result = sqlx::query(
            r"
            INSERT INTO replies (post_id, author_id, content, image_path, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(post_id)
        .bind(new.author_id.to_string())
        .bind(&new.content)
        .bind(&new.image_path)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create reply: {e}")))?;

        self.get_reply(result.last_insert_rowid())
            .await?
            .ok_or_else(|| AppError::internal("Reply vanished after insert"))
    }

    /// Get a reply by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_reply(&self, reply_id: i64) -> AppResult<Option<Reply>> {
        let row = sqlx::query(
            r"
            SELECT r.*, u.username AS author_username
            FROM replies r JOIN users u ON u.id = r.author_id
            WHERE r.id = $1
            ",
        )
        .bind(reply_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get reply: {e}")))?;
        row.map(|r| Self::row_to_reply(&r)).transpose()
    }

    /// Replies of a post, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_replies(&self, post_id: i64) -> AppResult<Vec<Reply>> {
        let rows = sqlx::query(
            r"
            SELECT r.*, u.username AS author_username
            FROM replies r JOIN users u ON u.id = r.author_id
            WHERE r.post_id = $1
            ORDER BY r.created_at, r.id
            ",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list replies: {e}")))?;
        rows.iter().map(Self::row_to_reply).collect()
    }

    /// Delete a reply
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_reply(&self, reply_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM replies WHERE id = $1")
            .bind(reply_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete reply: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_reply(row: &SqliteRow) -> AppResult<Reply> {
        let author_id: String = row.get("author_id");
        let created_at: String = row.get("created_at");
        Ok(Reply {
            id: row.get("id"),
            post_id: row.get("post_id"),
            author_id: parse_uuid(&author_id)?,
            author_username: row.get("author_username"),
            content: row.get("content"),
            image_path: row.get("image_path"),
            created_at: parse_timestamp(&created_at)?,
        })
    }

    // ========================================================================
    // Reactions
    // ========================================================================

    const fn reaction_table(target: ReactionTarget) -> (&'static str, &'static str, i64) {
        match target {
            ReactionTarget::Post(id) => ("reactions", "post_id", id),
            ReactionTarget::Reply(id) => ("reply_reactions", "reply_id", id),
        }
    }

    /// Toggle a reaction of `user_id` on a post or reply.
    ///
    /// Runs as one transaction whose first statement is a write, so
    /// concurrent toggles by the same user serialize on the unique index.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn react(
        &self,
        target: ReactionTarget,
        user_id: Uuid,
        reaction_type: &str,
    ) -> AppResult<ReactionChange> {
        let (table, column, target_id) = Self::reaction_table(target);
        let user = user_id.to_string();
        let stamp = format_timestamp(Utc::now());
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        let removed = sqlx::query(&format!(
            "DELETE FROM {table} WHERE {column} = $1 AND user_id = $2 AND reaction_type = $3"
        ))
        .bind(target_id)
        .bind(&user)
        .bind(reaction_type)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to remove reaction: {e}")))?
        .rows_affected();

        let change = if removed > 0 {
            ReactionChange::Removed
        } else {
            let replaced = sqlx::query(&format!(
                "UPDATE {table} SET reaction_type = $3, created_at = $4 WHERE {column} = $1 AND user_id = $2"
            ))
            .bind(target_id)
            .bind(&user)
            .bind(reaction_type)
            .bind(&stamp)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to replace reaction: {e}")))?
            .rows_affected();
            if replaced > 0 {
                ReactionChange::Replaced
            } else {
                sqlx::query(&format!(
                    "INSERT INTO {table} ({column}, user_id, reaction_type, created_at) VALUES ($1, $2, $3, $4)"
                ))
                .bind(target_id)
                .bind(&user)
                .bind(reaction_type)
                .bind(&stamp)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::database(format!("Failed to add reaction: {e}")))?;
                ReactionChange::Added
            }
        };

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit reaction: {e}")))?;
        Ok(change)
    }

    /// Counts per reaction type plus the viewer's own reaction
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn reaction_summary(
        &self,
        target: ReactionTarget,
        viewer: Uuid,
    ) -> AppResult<ReactionSummary> {
        let (table, column, target_id) = Self::reaction_table(target);

        let rows = sqlx::query(&format!(
            "SELECT reaction_type, COUNT(*) AS total FROM {table} WHERE {column} = $1 GROUP BY reaction_type"
        ))
        .bind(target_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to count reactions: {e}")))?;

        let user_reaction: Option<String> = sqlx::query_scalar(&format!(
            "SELECT reaction_type FROM {table} WHERE {column} = $1 AND user_id = $2"
        ))
        .bind(target_id)
        .bind(viewer.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to read reaction: {e}")))?;

        Ok(ReactionSummary {
            counts: rows
                .iter()
                .map(|row| (row.get("reaction_type"), row.get("total")))
                .collect(),
            user_reaction,
        })
    }
}
