// ABOUTME: Community, membership and invitation storage
// ABOUTME: Loads the adjacency list as a CommunityForest for hierarchy walks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use chrono::Utc;
use cpoint_core::errors::{AppError, AppResult};
use cpoint_core::hierarchy::{CommunityForest, CommunityNode};
use cpoint_core::models::{
    Community, CommunityInvitation, CommunityMember, CommunityRole, MembershipSummary,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{
    execute_schema, format_timestamp, parse_optional_timestamp, parse_timestamp, parse_uuid,
    placeholders,
};

const COMMUNITY_COLUMNS: &str = "c.id, c.name, c.community_type, c.description, c.creator_id, \
     c.join_code, c.parent_community_id, c.background_color, c.text_color, c.accent_color, \
     c.max_members, c.created_at";

/// Fields needed to create a community
#[derive(Debug, Clone)]
pub struct NewCommunity {
    /// Display name
    pub name: String,
    /// Free-form type
    pub community_type: String,
    /// Description
    pub description: Option<String>,
    /// Owner
    pub creator_id: Uuid,
    /// Unique join code
    pub join_code: String,
    /// Parent community
    pub parent_community_id: Option<i64>,
    /// Theme background colour
    pub background_color: Option<String>,
    /// Theme text colour
    pub text_color: Option<String>,
    /// Theme accent colour
    pub accent_color: Option<String>,
    /// Membership cap
    pub max_members: Option<i64>,
}

/// Editable community fields; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct CommunityUpdate {
    /// Display name
    pub name: Option<String>,
    /// Free-form type
    pub community_type: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Theme background colour
    pub background_color: Option<String>,
    /// Theme text colour
    pub text_color: Option<String>,
    /// Theme accent colour
    pub accent_color: Option<String>,
    /// Membership cap
    pub max_members: Option<i64>,
}

/// Fields needed to store an invitation
#[derive(Debug, Clone)]
pub struct NewInvitation {
    /// Target community
    pub community_id: i64,
    /// Opaque token
    pub token: String,
    /// Invited address or QR placeholder
    pub invited_email: String,
    /// Issuer
    pub invited_by: Uuid,
    /// Explicit parents to join
    pub include_parent_ids: Option<Vec<i64>>,
    /// Nested communities to join
    pub include_nested_ids: Vec<i64>,
}

/// Community database operations
pub struct CommunityManager {
    pool: SqlitePool,
}

impl CommunityManager {
    /// Create a new community manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create community tables
    ///
    /// # Errors
    ///
    /// Returns an error if a schema statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        execute_schema(
            &self.pool,
            &[
                r"
                CREATE TABLE IF NOT EXISTS communities (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    community_type TEXT NOT NULL,
                    description TEXT,
                    creator_id TEXT NOT NULL REFERENCES users(id) ON DELETE RESTRICT,
                    join_code TEXT NOT NULL UNIQUE,
                    parent_community_id INTEGER REFERENCES communities(id) ON DELETE CASCADE,
                    background_color TEXT,
                    text_color TEXT,
                    accent_color TEXT,
                    max_members INTEGER,
                    created_at TEXT NOT NULL
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS user_communities (
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    community_id INTEGER NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
                    role TEXT NOT NULL DEFAULT 'member',
                    joined_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, community_id)
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS community_invitations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    community_id INTEGER NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
                    token TEXT NOT NULL UNIQUE,
                    invited_email TEXT NOT NULL,
                    invited_by TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    include_parent_ids TEXT,
                    include_nested_ids TEXT NOT NULL DEFAULT '[]',
                    used INTEGER NOT NULL DEFAULT 0,
                    used_at TEXT,
                    created_at TEXT NOT NULL
                )
                ",
                "CREATE INDEX IF NOT EXISTS idx_communities_parent ON communities(parent_community_id)",
                "CREATE INDEX IF NOT EXISTS idx_user_communities_community ON user_communities(community_id)",
                "CREATE INDEX IF NOT EXISTS idx_invitations_community ON community_invitations(community_id)",
            ],
        )
        .await
    }

    // ========================================================================
    // Communities
    // ========================================================================

    /// Insert a community; membership rows are added separately
    ///
    /// # Errors
    ///
    /// Returns an error if the join code collides or the query fails
    pub async fn create_community(&self, new: &NewCommunity) -> AppResult<Community> {
        let now = Utc::now();
        let result = sqlx::query(
            r"
            INSERT INTO communities (name, community_type, description, creator_id, join_code,
                                     parent_community_id, background_color, text_color,
                                     accent_color, max_members, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(&new.name)
        .bind(&new.community_type)
        .bind(&new.description)
        .bind(new.creator_id.to_string())
        .bind(&new.join_code)
        .bind(new.parent_community_id)
        .bind(&new.background_color)
        .bind(&new.text_color)
        .bind(&new.accent_color)
        .bind(new.max_members)
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create community: {e}")))?;

        Ok(Community {
            id: result.last_insert_rowid(),
            name: new.name.clone(),
            community_type: new.community_type.clone(),
            description: new.description.clone(),
            creator_id: new.creator_id,
            join_code: new.join_code.clone(),
            parent_community_id: new.parent_community_id,
            background_color: new.background_color.clone(),
            text_color: new.text_color.clone(),
            accent_color: new.accent_color.clone(),
            max_members: new.max_members,
            created_at: now,
        })
    }

    /// Get a community by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_community(&self, community_id: i64) -> AppResult<Option<Community>> {
        let row = sqlx::query(&format!(
            "SELECT {COMMUNITY_COLUMNS} FROM communities c WHERE c.id = $1"
        ))
        .bind(community_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get community: {e}")))?;
        row.map(|r| Self::row_to_community(&r)).transpose()
    }

    /// Get a community by its join code (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_by_join_code(&self, join_code: &str) -> AppResult<Option<Community>> {
        let row = sqlx::query(&format!(
            "SELECT {COMMUNITY_COLUMNS} FROM communities c WHERE c.join_code = $1 COLLATE NOCASE"
        ))
        .bind(join_code.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get community by code: {e}")))?;
        row.map(|r| Self::row_to_community(&r)).transpose()
    }

    /// Whether a join code is already used
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn join_code_exists(&self, join_code: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM communities WHERE join_code = $1 COLLATE NOCASE",
        )
        .bind(join_code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to check join code: {e}")))?;
        Ok(count > 0)
    }

    /// Apply changes and return the updated community
    ///
    /// # Errors
    ///
    /// Returns an error if the community is missing or the query fails
    pub async fn update_community(
        &self,
        community_id: i64,
        update: &CommunityUpdate,
    ) -> AppResult<Community> {
        sqlx::query(
            r"
            UPDATE communities SET
                name = COALESCE($2, name),
                community_type = COALESCE($3, community_type),
                description = COALESCE($4, description),
                background_color = COALESCE($5, background_color),
                text_color = COALESCE($6, text_color),
                accent_color = COALESCE($7, accent_color),
                max_members = COALESCE($8, max_members)
            WHERE id = $1
            ",
        )
        .bind(community_id)
        .bind(&update.name)
        .bind(&update.community_type)
        .bind(&update.description)
        .bind(&update.background_color)
        .bind(&update.text_color)
        .bind(&update.accent_color)
        .bind(update.max_members)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update community: {e}")))?;

        self.get_community(community_id)
            .await?
            .ok_or_else(|| AppError::not_found("Community"))
    }

    /// Transfer ownership of a community
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn set_creator(&self, community_id: i64, user_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE communities SET creator_id = $2 WHERE id = $1")
            .bind(community_id)
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to transfer ownership: {e}")))?;
        Ok(())
    }

    /// Hand every community created by `from` to `to`; returns the affected ids
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails; nothing changes in that case
    pub async fn reassign_creator(&self, from: Uuid, to: Uuid) -> AppResult<Vec<i64>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM communities WHERE creator_id = $1 ORDER BY id")
            .bind(from.to_string())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to list owned communities: {e}")))?;
        sqlx::query("UPDATE communities SET creator_id = $2 WHERE creator_id = $1")
            .bind(from.to_string())
            .bind(to.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to reassign communities: {e}")))?;
        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit reassignment: {e}")))?;
        Ok(ids)
    }

    /// Delete communities in the given order; dependent rows cascade
    ///
    /// # Errors
    ///
    /// Returns an error if a delete fails; nothing is deleted in that case
    pub async fn delete_communities(&self, ordered_ids: &[i64]) -> AppResult<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        let mut deleted = 0;
        for id in ordered_ids {
            let result = sqlx::query("DELETE FROM communities WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::database(format!("Failed to delete community {id}: {e}")))?;
            deleted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit community delete: {e}")))?;
        Ok(deleted)
    }

    /// Load every community's adjacency into a forest
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn load_forest(&self) -> AppResult<CommunityForest> {
        let rows = sqlx::query("SELECT id, parent_community_id, creator_id FROM communities")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to load community tree: {e}")))?;

        let nodes = rows
            .iter()
            .map(|row| {
                let creator_id: String = row.get("creator_id");
                Ok(CommunityNode {
                    id: row.get("id"),
                    parent_id: row.get("parent_community_id"),
                    creator_id: parse_uuid(&creator_id)?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        Ok(CommunityForest::from_nodes(nodes))
    }

    /// Direct children of a community
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_children(&self, community_id: i64) -> AppResult<Vec<Community>> {
        let rows = sqlx::query(&format!(
            "SELECT {COMMUNITY_COLUMNS} FROM communities c WHERE c.parent_community_id = $1 ORDER BY c.name"
        ))
        .bind(community_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list sub-communities: {e}")))?;
        rows.iter().map(Self::row_to_community).collect()
    }

    /// Number of communities
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn count_communities(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM communities")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count communities: {e}")))
    }

    fn row_to_community(row: &SqliteRow) -> AppResult<Community> {
        let creator_id: String = row.get("creator_id");
        let created_at: String = row.get("created_at");
        Ok(Community {
            id: row.get("id"),
            name: row.get("name"),
            community_type: row.get("community_type"),
            description: row.get("description"),
            creator_id: parse_uuid(&creator_id)?,
            join_code: row.get("join_code"),
            parent_community_id: row.get("parent_community_id"),
            background_color: row.get("background_color"),
            text_color: row.get("text_color"),
            accent_color: row.get("accent_color"),
            max_members: row.get("max_members"),
            created_at: parse_timestamp(&created_at)?,
        })
    }

    // ========================================================================
    // Membership
    // ========================================================================

    /// Stored role of a user in a community, if a member
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_membership_role(
        &self,
        user_id: Uuid,
        community_id: i64,
    ) -> AppResult<Option<String>> {
        sqlx::query_scalar(
            "SELECT role FROM user_communities WHERE user_id = $1 AND community_id = $2",
        )
        .bind(user_id.to_string())
        .bind(community_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get membership: {e}")))
    }

    /// Add a membership unless one exists; returns whether a row was inserted
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn add_member(
        &self,
        user_id: Uuid,
        community_id: i64,
        role: CommunityRole,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            INSERT OR IGNORE INTO user_communities (user_id, community_id, role, joined_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(user_id.to_string())
        .bind(community_id)
        .bind(role.as_str())
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to add member: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    /// Insert or overwrite a membership role
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn upsert_member_role(
        &self,
        user_id: Uuid,
        community_id: i64,
        role: CommunityRole,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO user_communities (user_id, community_id, role, joined_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(user_id, community_id) DO UPDATE SET role = excluded.role
            ",
        )
        .bind(user_id.to_string())
        .bind(community_id)
        .bind(role.as_str())
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to set member role: {e}")))?;
        Ok(())
    }

    /// Remove a user from the listed communities
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn remove_memberships(&self, user_id: Uuid, community_ids: &[i64]) -> AppResult<u64> {
        if community_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM user_communities WHERE user_id = $1 AND community_id IN ({})",
            placeholders(2, community_ids.len())
        );
        let mut query = sqlx::query(&sql).bind(user_id.to_string());
        for id in community_ids {
            query = query.bind(id);
        }
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to remove memberships: {e}")))?;
        Ok(result.rows_affected())
    }

    /// Demote `owner` rows of a user to `admin` in the listed communities
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn demote_owner_roles(&self, user_id: Uuid, community_ids: &[i64]) -> AppResult<u64> {
        if community_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "UPDATE user_communities SET role = 'admin' \
             WHERE user_id = $1 AND role = 'owner' AND community_id IN ({})",
            placeholders(2, community_ids.len())
        );
        let mut query = sqlx::query(&sql).bind(user_id.to_string());
        for id in community_ids {
            query = query.bind(id);
        }
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to demote owner roles: {e}")))?;
        Ok(result.rows_affected())
    }

    /// Number of members of a community
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn count_members(&self, community_id: i64) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM user_communities WHERE community_id = $1")
            .bind(community_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count members: {e}")))
    }

    /// Members of a community joined with user details, unsorted
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_members(&self, community_id: i64) -> AppResult<Vec<CommunityMember>> {
        let rows = sqlx::query(
            r"
            SELECT u.id AS user_id, u.username, u.first_name, u.last_name, u.profile_picture,
                   uc.role, uc.joined_at, (c.creator_id = u.id) AS is_creator
            FROM user_communities uc
            JOIN users u ON u.id = uc.user_id
            JOIN communities c ON c.id = uc.community_id
            WHERE uc.community_id = $1
            ",
        )
        .bind(community_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list members: {e}")))?;

        rows.iter()
            .map(|row| {
                let user_id: String = row.get("user_id");
                let joined_at: String = row.get("joined_at");
                let first_name: String = row.get("first_name");
                let last_name: Option<String> = row.get("last_name");
                let display_name = match last_name.as_deref().map(str::trim) {
                    Some(last) if !last.is_empty() => format!("{first_name} {last}"),
                    _ => first_name,
                };
                Ok(CommunityMember {
                    user_id: parse_uuid(&user_id)?,
                    username: row.get("username"),
                    display_name,
                    profile_picture: row.get("profile_picture"),
                    role: row.get("role"),
                    is_creator: row.get::<i64, _>("is_creator") != 0,
                    joined_at: parse_timestamp(&joined_at)?,
                })
            })
            .collect()
    }

    /// Ids of every member of a community
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn member_ids(&self, community_id: i64) -> AppResult<Vec<Uuid>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT user_id FROM user_communities WHERE community_id = $1")
                .bind(community_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to list member ids: {e}")))?;
        ids.iter().map(|id| parse_uuid(id)).collect()
    }

    /// Communities a user belongs to, with their role
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_user_communities(&self, user_id: Uuid) -> AppResult<Vec<MembershipSummary>> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {COMMUNITY_COLUMNS}, uc.role, uc.joined_at
            FROM user_communities uc
            JOIN communities c ON c.id = uc.community_id
            WHERE uc.user_id = $1
            ORDER BY c.name COLLATE NOCASE
            "
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list user communities: {e}")))?;

        rows.iter()
            .map(|row| {
                let joined_at: String = row.get("joined_at");
                Ok(MembershipSummary {
                    community: Self::row_to_community(row)?,
                    role: row.get("role"),
                    joined_at: parse_timestamp(&joined_at)?,
                })
            })
            .collect()
    }

    // ========================================================================
    // Invitations
    // ========================================================================

    /// Store an invitation
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or the query fails
    pub async fn create_invitation(&self, new: &NewInvitation) -> AppResult<CommunityInvitation> {
        let now = Utc::now();
        let parents = new
            .include_parent_ids
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::internal(format!("Failed to encode parent ids: {e}")))?;
        let nested = serde_json::to_string(&new.include_nested_ids)
            .map_err(|e| AppError::internal(format!("Failed to encode nested ids: {e}")))?;

        let result = sqlx::query(
            r"
            INSERT INTO community_invitations (community_id, token, invited_email, invited_by,
                                               include_parent_ids, include_nested_ids, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(new.community_id)
        .bind(&new.token)
        .bind(new.invited_email.trim().to_lowercase())
        .bind(new.invited_by.to_string())
        .bind(parents)
        .bind(nested)
        .bind(format_timestamp(now))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create invitation: {e}")))?;

        Ok(CommunityInvitation {
            id: result.last_insert_rowid(),
            community_id: new.community_id,
            token: new.token.clone(),
            invited_email: new.invited_email.trim().to_lowercase(),
            invited_by: new.invited_by,
            include_parent_ids: new.include_parent_ids.clone(),
            include_nested_ids: new.include_nested_ids.clone(),
            used: false,
            used_at: None,
            created_at: now,
        })
    }

    /// Get an invitation by token
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_invitation_by_token(&self, token: &str) -> AppResult<Option<CommunityInvitation>> {
        let row = sqlx::query("SELECT * FROM community_invitations WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get invitation: {e}")))?;
        row.map(|r| Self::row_to_invitation(&r)).transpose()
    }

    /// Invitations of a community, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_invitations(&self, community_id: i64) -> AppResult<Vec<CommunityInvitation>> {
        let rows = sqlx::query(
            "SELECT * FROM community_invitations WHERE community_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(community_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list invitations: {e}")))?;
        rows.iter().map(Self::row_to_invitation).collect()
    }

    /// Mark an invitation consumed
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn mark_invitation_used(&self, invitation_id: i64) -> AppResult<()> {
        sqlx::query("UPDATE community_invitations SET used = 1, used_at = $2 WHERE id = $1")
            .bind(invitation_id)
            .bind(format_timestamp(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to mark invitation used: {e}")))?;
        Ok(())
    }

    /// Revoke an invitation of a community
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_invitation(&self, community_id: i64, invitation_id: i64) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM community_invitations WHERE id = $1 AND community_id = $2")
                .bind(invitation_id)
                .bind(community_id)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to delete invitation: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_invitation(row: &SqliteRow) -> AppResult<CommunityInvitation> {
        let invited_by: String = row.get("invited_by");
        let created_at: String = row.get("created_at");
        let parents: Option<String> = row.get("include_parent_ids");
        let nested: String = row.get("include_nested_ids");

        let include_parent_ids = parents
            .as_deref()
            .map(serde_json::from_str::<Vec<i64>>)
            .transpose()
            .map_err(|e| AppError::database(format!("Invalid parent id list: {e}")))?;
        let include_nested_ids = serde_json::from_str::<Vec<i64>>(&nested)
            .map_err(|e| AppError::database(format!("Invalid nested id list: {e}")))?;

        Ok(CommunityInvitation {
            id: row.get("id"),
            community_id: row.get("community_id"),
            token: row.get("token"),
            invited_email: row.get("invited_email"),
            invited_by: parse_uuid(&invited_by)?,
            include_parent_ids,
            include_nested_ids,
            used: row.get::<i64, _>("used") != 0,
            used_at: parse_optional_timestamp(row.get("used_at"))?,
            created_at: parse_timestamp(&created_at)?,
        })
    }
}
