// ABOUTME: Group chat storage with per-member read receipts
// ABOUTME: Leaving promotes the earliest member when the creator goes and closes empty groups
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use chrono::Utc;
use cpoint_core::errors::{AppError, AppResult};
use cpoint_core::models::{GroupChat, GroupChatMember, GroupChatMessage, GroupChatSummary};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{execute_schema, format_timestamp, parse_timestamp, parse_uuid};

const GROUP_MESSAGE_SELECT: &str = r"
    SELECT gm.id, gm.group_id, gm.sender_id, gm.message, gm.image_path, gm.created_at,
           u.username AS sender_username
    FROM group_chat_messages gm
    JOIN users u ON u.id = gm.sender_id
";

/// What happened when a member left a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The member left; the group carries on unchanged
    Left,
    /// The creator left and another member became admin
    AdminTransferred {
        /// Newly promoted member
        new_admin: Uuid,
    },
    /// The last member left and the group was deactivated
    GroupClosed,
}

/// Group chat database operations
pub struct GroupChatManager {
    pool: SqlitePool,
}

impl GroupChatManager {
    /// Create a new group chat manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create group chat tables
    ///
    /// # Errors
    ///
    /// Returns an error if a schema statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        execute_schema(
            &self.pool,
            &[
                r"
                CREATE TABLE IF NOT EXISTS group_chats (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    creator_id TEXT NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS group_chat_members (
                    group_id INTEGER NOT NULL REFERENCES group_chats(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    role TEXT NOT NULL DEFAULT 'member',
                    joined_at TEXT NOT NULL,
                    last_read_message_id INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (group_id, user_id)
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS group_chat_messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    group_id INTEGER NOT NULL REFERENCES group_chats(id) ON DELETE CASCADE,
                    sender_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    message TEXT,
                    image_path TEXT,
                    is_deleted INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                )
                ",
                "CREATE INDEX IF NOT EXISTS idx_group_members_user ON group_chat_members(user_id)",
                "CREATE INDEX IF NOT EXISTS idx_group_messages_group ON group_chat_messages(group_id, id)",
            ],
        )
        .await
    }

    /// Create a group with the creator as admin and the others as members
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn create_group(
        &self,
        name: &str,
        creator_id: Uuid,
        member_ids: &[Uuid],
    ) -> AppResult<GroupChat> {
        let now = Utc::now();
        let stamp = format_timestamp(now);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        let result = sqlx::query(
            "INSERT INTO group_chats (name, creator_id, is_active, created_at, updated_at) VALUES ($1, $2, 1, $3, $3)",
        )
        .bind(name)
        .bind(creator_id.to_string())
        .bind(&stamp)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to create group chat: {e}")))?;
        let group_id = result.last_insert_rowid();

        let members = std::iter::once((creator_id, "admin"))
            .chain(member_ids.iter().map(|id| (*id, "member")));
        for (user_id, role) in members {
            sqlx::query(
                r"
                INSERT OR IGNORE INTO group_chat_members (group_id, user_id, role, joined_at)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(group_id)
            .bind(user_id.to_string())
            .bind(role)
            .bind(&stamp)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to add group member: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit group chat: {e}")))?;

        Ok(GroupChat {
            id: group_id,
            name: name.to_owned(),
            creator_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a group by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_group(&self, group_id: i64) -> AppResult<Option<GroupChat>> {
        let row = sqlx::query("SELECT * FROM group_chats WHERE id = $1")
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get group chat: {e}")))?;
        row.map(|r| Self::row_to_group(&r)).transpose()
    }

    /// Active groups of a user with counts and the latest message, most recently active first
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<GroupChatSummary>> {
        let user = user_id.to_string();
        let rows = sqlx::query(
            r"
            SELECT g.*, m.last_read_message_id
            FROM group_chats g
            JOIN group_chat_members m ON m.group_id = g.id
            WHERE m.user_id = $1 AND g.is_active = 1
            ORDER BY g.updated_at DESC, g.id DESC
            ",
        )
        .bind(&user)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list group chats: {e}")))?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let group = Self::row_to_group(&row)?;
            let last_read: i64 = row.get("last_read_message_id");

            let member_count = self.member_count(group.id).await?;
            let last_message = sqlx::query(&format!(
                "{GROUP_MESSAGE_SELECT} WHERE gm.group_id = $1 AND gm.is_deleted = 0 ORDER BY gm.id DESC LIMIT 1"
            ))
            .bind(group.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get last group message: {e}")))?
            .map(|r| Self::row_to_message(&r))
            .transpose()?;
            let unread_count: i64 = sqlx::query_scalar(
                r"
                SELECT COUNT(*) FROM group_chat_messages
                WHERE group_id = $1 AND id > $2 AND is_deleted = 0 AND sender_id != $3
                ",
            )
            .bind(group.id)
            .bind(last_read)
            .bind(&user)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count unread group messages: {e}")))?;

            summaries.push(GroupChatSummary {
                group,
                member_count,
                last_message,
                unread_count,
            });
        }
        Ok(summaries)
    }

    /// Group role of a user, if a member
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn member_role(&self, group_id: i64, user_id: Uuid) -> AppResult<Option<String>> {
        sqlx::query_scalar("SELECT role FROM group_chat_members WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get group membership: {e}")))
    }

    /// Whether a user belongs to a group
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn is_member(&self, group_id: i64, user_id: Uuid) -> AppResult<bool> {
        Ok(self.member_role(group_id, user_id).await?.is_some())
    }

    /// Members of a group, admins first then by join time
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn members(&self, group_id: i64) -> AppResult<Vec<GroupChatMember>> {
        let rows = sqlx::query(
            r"
            SELECT m.user_id, u.username, m.role, m.joined_at
            FROM group_chat_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.group_id = $1
            ORDER BY (m.role = 'admin') DESC, m.joined_at, u.username
            ",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list group members: {e}")))?;

        rows.iter()
            .map(|row| {
                let user_id: String = row.get("user_id");
                let joined_at: String = row.get("joined_at");
                Ok(GroupChatMember {
                    user_id: parse_uuid(&user_id)?,
                    username: row.get("username"),
                    role: row.get("role"),
                    joined_at: parse_timestamp(&joined_at)?,
                })
            })
            .collect()
    }

    /// Number of members
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn member_count(&self, group_id: i64) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM group_chat_members WHERE group_id = $1")
            .bind(group_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count group members: {e}")))
    }

    /// Visible messages older than `before_id`, returned oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn messages(
        &self,
        group_id: i64,
        before_id: Option<i64>,
        limit: i64,
    ) -> AppResult<Vec<GroupChatMessage>> {
        let rows = sqlx::query(&format!(
            r"{GROUP_MESSAGE_SELECT}
            WHERE gm.group_id = $1 AND gm.is_deleted = 0 AND ($2 IS NULL OR gm.id < $2)
            ORDER BY gm.id DESC
            LIMIT $3
            "
        ))
        .bind(group_id)
        .bind(before_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to load group messages: {e}")))?;

        let mut messages = rows
            .iter()
            .map(Self::row_to_message)
            .collect::<AppResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }

    /// Advance a member's read receipt; it never moves backwards
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn mark_read(&self, group_id: i64, user_id: Uuid, message_id: i64) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE group_chat_members
            SET last_read_message_id = MAX(last_read_message_id, $3)
            WHERE group_id = $1 AND user_id = $2
            ",
        )
        .bind(group_id)
        .bind(user_id.to_string())
        .bind(message_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update read receipt: {e}")))?;
        Ok(())
    }

    /// Post a message, bump the group's activity time and the sender's receipt
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn send_message(
        &self,
        group_id: i64,
        sender_id: Uuid,
        message: Option<&str>,
        image_path: Option<&str>,
    ) -> AppResult<GroupChatMessage> {
        let stamp = format_timestamp(Utc::now());
        let result = sqlx::query(
            r"
            INSERT INTO group_chat_messages (group_id, sender_id, message, image_path, is_deleted, created_at)
            VALUES ($1, $2, $3, $4, 0, $5)
            ",
        )
        .bind(group_id)
        .bind(sender_id.to_string())
        .bind(message)
        .bind(image_path)
        .bind(&stamp)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to send group message: {e}")))?;
        let message_id = result.last_insert_rowid();

        sqlx::query("UPDATE group_chats SET updated_at = $2 WHERE id = $1")
            .bind(group_id)
            .bind(&stamp)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to touch group chat: {e}")))?;
        self.mark_read(group_id, sender_id, message_id).await?;

        let row = sqlx::query(&format!("{GROUP_MESSAGE_SELECT} WHERE gm.id = $1"))
            .bind(message_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to load group message: {e}")))?;
        Self::row_to_message(&row)
    }

    /// Soft-delete a message sent by `sender_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_message(&self, group_id: i64, message_id: i64, sender_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE group_chat_messages SET is_deleted = 1 WHERE id = $1 AND group_id = $2 AND sender_id = $3",
        )
        .bind(message_id)
        .bind(group_id)
        .bind(sender_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to delete group message: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a member, handing over admin or closing the group as needed.
    ///
    /// A departing creator passes both the admin role and the group itself
    /// to the earliest remaining member.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn leave(&self, group: &GroupChat, user_id: Uuid) -> AppResult<LeaveOutcome> {
        sqlx::query("DELETE FROM group_chat_members WHERE group_id = $1 AND user_id = $2")
            .bind(group.id)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to leave group chat: {e}")))?;

        if self.member_count(group.id).await? == 0 {
            sqlx::query("UPDATE group_chats SET is_active = 0, updated_at = $2 WHERE id = $1")
                .bind(group.id)
                .bind(format_timestamp(Utc::now()))
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to close group chat: {e}")))?;
            return Ok(LeaveOutcome::GroupClosed);
        }

        if group.creator_id != user_id {
            return Ok(LeaveOutcome::Left);
        }

        let earliest: String = sqlx::query_scalar(
            "SELECT user_id FROM group_chat_members WHERE group_id = $1 ORDER BY joined_at, rowid LIMIT 1",
        )
        .bind(group.id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to find next admin: {e}")))?;

        sqlx::query("UPDATE group_chat_members SET role = 'admin' WHERE group_id = $1 AND user_id = $2")
            .bind(group.id)
            .bind(&earliest)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to promote group admin: {e}")))?;
        sqlx::query("UPDATE group_chats SET creator_id = $2, updated_at = $3 WHERE id = $1")
            .bind(group.id)
            .bind(&earliest)
            .bind(format_timestamp(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to hand over group chat: {e}")))?;

        Ok(LeaveOutcome::AdminTransferred {
            new_admin: parse_uuid(&earliest)?,
        })
    }

    /// Detach a user from every group chat ahead of account deletion.
    ///
    /// Memberships are left as with [`Self::leave`]. Groups the user created
    /// but no longer belongs to pass to their earliest member, or are deleted
    /// when empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn release_user(&self, user_id: Uuid) -> AppResult<()> {
        let user = user_id.to_string();
        let group_ids: Vec<i64> =
            sqlx::query_scalar("SELECT group_id FROM group_chat_members WHERE user_id = $1")
                .bind(&user)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to list group memberships: {e}")))?;
        for group_id in group_ids {
            if let Some(group) = self.get_group(group_id).await? {
                self.leave(&group, user_id).await?;
            }
        }

        sqlx::query(
            r"
            UPDATE group_chats SET
                creator_id = (
                    SELECT m.user_id FROM group_chat_members m
                    WHERE m.group_id = group_chats.id
                    ORDER BY m.joined_at, m.rowid LIMIT 1
                ),
                updated_at = $2
            WHERE creator_id = $1
              AND EXISTS (SELECT 1 FROM group_chat_members m WHERE m.group_id = group_chats.id)
            ",
        )
        .bind(&user)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to hand over group chats: {e}")))?;

        sqlx::query("DELETE FROM group_chats WHERE creator_id = $1")
            .bind(&user)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete empty group chats: {e}")))?;
        Ok(())
    }

    /// Add members; existing members are ignored. Returns rows inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn add_members(&self, group_id: i64, user_ids: &[Uuid]) -> AppResult<u64> {
        let stamp = format_timestamp(Utc::now());
        let mut added = 0;
        for user_id in user_ids {
            let result = sqlx::query(
                r"
                INSERT OR IGNORE INTO group_chat_members (group_id, user_id, role, joined_at)
                VALUES ($1, $2, 'member', $3)
                ",
            )
            .bind(group_id)
            .bind(user_id.to_string())
            .bind(&stamp)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to add group member: {e}")))?;
            added += result.rows_affected();
        }
        Ok(added)
    }

    fn row_to_group(row: &SqliteRow) -> AppResult<GroupChat> {
        let creator_id: String = row.get("creator_id");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");
        Ok(GroupChat {
            id: row.get("id"),
            name: row.get("name"),
            creator_id: parse_uuid(&creator_id)?,
            is_active: row.get::<i64, _>("is_active") != 0,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    fn row_to_message(row: &SqliteRow) -> AppResult<GroupChatMessage> {
        let sender_id: String = row.get("sender_id");
        let created_at: String = row.get("created_at");
        Ok(GroupChatMessage {
            id: row.get("id"),
            group_id: row.get("group_id"),
            sender_id: parse_uuid(&sender_id)?,
            sender_username: row.get("sender_username"),
            message: row.get("message"),
            image_path: row.get("image_path"),
            created_at: parse_timestamp(&created_at)?,
        })
    }
}
