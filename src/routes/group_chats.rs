// ABOUTME: Group chat route handlers: small named groups with read receipts
// ABOUTME: Membership gates every endpoint; leaving may hand over admin or close the group
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use cpoint_core::constants::limits::{MAX_GROUP_MEMBERS, MAX_GROUP_NAME_LEN, MAX_POST_LEN};
use cpoint_core::errors::AppError;
use cpoint_core::models::{GroupChat, GroupChatMember, GroupChatMessage, GroupChatSummary, User};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::messages::ThreadQuery;
use crate::database::{Database, LeaveOutcome};
use crate::resources::ServerResources;
use crate::services::validation::{required, text_or_image, validate_length};

// ============================================================================
// Request / Response Types
// ============================================================================

/// New group form
#[derive(Debug, Deserialize, Default)]
pub struct CreateGroupRequest {
    /// Group name
    pub name: Option<String>,
    /// Other members by username
    #[serde(default)]
    pub members: Vec<String>,
}

/// Usernames to add
#[derive(Debug, Deserialize)]
pub struct AddMembersRequest {
    /// Handles of the new members
    pub usernames: Vec<String>,
}

/// Group message form
#[derive(Debug, Deserialize, Default)]
pub struct GroupMessageRequest {
    /// Text body
    pub message: Option<String>,
    /// Upload reference
    pub image_path: Option<String>,
}

/// Group with its members
#[derive(Debug, Serialize, Deserialize)]
pub struct GroupDetailResponse {
    /// Group row
    pub group: GroupChat,
    /// Members in join order
    pub members: Vec<GroupChatMember>,
}

/// The caller's groups
#[derive(Debug, Serialize, Deserialize)]
pub struct GroupListResponse {
    /// Most recently active first
    pub groups: Vec<GroupChatSummary>,
}

/// One page of group messages
#[derive(Debug, Serialize, Deserialize)]
pub struct GroupMessagesResponse {
    /// Oldest first
    pub messages: Vec<GroupChatMessage>,
}

// ============================================================================
// Routes
// ============================================================================

/// Group chat routes
pub struct GroupChatRoutes;

impl GroupChatRoutes {
    /// Create all group chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/group-chats",
                get(Self::handle_list).post(Self::handle_create),
            )
            .route("/api/group-chats/:id", get(Self::handle_get))
            .route(
                "/api/group-chats/:id/messages",
                get(Self::handle_messages).post(Self::handle_send),
            )
            .route(
                "/api/group-chats/:id/messages/:message_id",
                delete(Self::handle_delete_message),
            )
            .route("/api/group-chats/:id/leave", post(Self::handle_leave))
            .route("/api/group-chats/:id/members", post(Self::handle_add_members))
            .with_state(resources)
    }

    /// Handle POST /api/group-chats
    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<CreateGroupRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let name = required(body.name.as_deref(), "name")?;
        validate_length(name, MAX_GROUP_NAME_LEN, "name")?;

        let others = distinct_usernames(&body.members, &auth.user);
        if others.is_empty() || others.len() > MAX_GROUP_MEMBERS {
            return Err(AppError::invalid_input(format!(
                "A group needs between 1 and {MAX_GROUP_MEMBERS} other members"
            )));
        }
        let member_ids = resolve_members(&resources.database, &others).await?;

        let group = resources
            .database
            .group_chats()
            .create_group(name, auth.user.id, &member_ids)
            .await?;
        info!(group_id = group.id, members = member_ids.len() + 1, "Group chat created");
        let members = resources.database.group_chats().members(group.id).await?;
        Ok((StatusCode::CREATED, Json(GroupDetailResponse { group, members })).into_response())
    }

    /// Handle GET /api/group-chats
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let groups = resources
            .database
            .group_chats()
            .list_for_user(auth.user.id)
            .await?;
        Ok((StatusCode::OK, Json(GroupListResponse { groups })).into_response())
    }

    /// Handle GET /api/group-chats/:id
    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(group_id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let group = require_group(&resources.database, group_id).await?;
        if !resources
            .database
            .group_chats()
            .is_member(group_id, auth.user.id)
            .await?
        {
            return Err(AppError::not_found("Group chat"));
        }
        let members = resources.database.group_chats().members(group_id).await?;
        Ok((StatusCode::OK, Json(GroupDetailResponse { group, members })).into_response())
    }

    /// Handle GET /api/group-chats/:id/messages
    async fn handle_messages(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(group_id): Path<i64>,
        Query(query): Query<ThreadQuery>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        require_group(&resources.database, group_id).await?;
        require_group_member(&resources.database, group_id, auth.user.id).await?;

        let chats = resources.database.group_chats();
        let messages = chats
            .messages(group_id, query.before_id, query.effective_limit())
            .await?;
        if let Some(newest) = messages.last() {
            chats.mark_read(group_id, auth.user.id, newest.id).await?;
        }
        Ok((StatusCode::OK, Json(GroupMessagesResponse { messages })).into_response())
    }

    /// Handle POST /api/group-chats/:id/messages
    async fn handle_send(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(group_id): Path<i64>,
        Json(body): Json<GroupMessageRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        require_group(&resources.database, group_id).await?;
        require_group_member(&resources.database, group_id, auth.user.id).await?;
        let (message, image_path) = text_or_image(
            body.message.as_deref(),
            body.image_path.as_deref(),
            MAX_POST_LEN,
        )?;

        let sent = resources
            .database
            .group_chats()
            .send_message(
                group_id,
                auth.user.id,
                message.as_deref(),
                image_path.as_deref(),
            )
            .await?;
        Ok((StatusCode::CREATED, Json(sent)).into_response())
    }

    /// Handle DELETE /api/group-chats/:id/messages/:message_id
    async fn handle_delete_message(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((group_id, message_id)): Path<(i64, i64)>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        require_group_member(&resources.database, group_id, auth.user.id).await?;
        if !resources
            .database
            .group_chats()
            .delete_message(group_id, message_id, auth.user.id)
            .await?
        {
            return Err(AppError::not_found("Message"));
        }
        Ok((StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response())
    }

    /// Handle POST /api/group-chats/:id/leave
    async fn handle_leave(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(group_id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let group = require_group(&resources.database, group_id).await?;
        require_group_member(&resources.database, group_id, auth.user.id).await?;

        let outcome = resources
            .database
            .group_chats()
            .leave(&group, auth.user.id)
            .await?;
        let (group_closed, new_admin) = match outcome {
            LeaveOutcome::Left => (false, None),
            LeaveOutcome::AdminTransferred { new_admin } => (false, Some(new_admin)),
            LeaveOutcome::GroupClosed => (true, None),
        };
        info!(group_id, user = %auth.user.username, group_closed, "Left group chat");
        Ok((
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "group_closed": group_closed,
                "new_admin_id": new_admin,
            })),
        )
            .into_response())
    }

    /// Handle POST /api/group-chats/:id/members
    async fn handle_add_members(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(group_id): Path<i64>,
        Json(body): Json<AddMembersRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        require_group(&resources.database, group_id).await?;
        let chats = resources.database.group_chats();
        match chats.member_role(group_id, auth.user.id).await?.as_deref() {
            Some("admin") => {}
            Some(_) => {
                return Err(AppError::permission_denied(
                    "Only group admins can add members",
                ))
            }
            None => return Err(AppError::not_found("Group chat")),
        }

        let usernames = distinct_usernames(&body.usernames, &auth.user);
        if usernames.is_empty() {
            return Err(AppError::missing_field("usernames"));
        }
        let ids = resolve_members(&resources.database, &usernames).await?;
        let mut new_ids = Vec::with_capacity(ids.len());
        for id in ids {
            if !chats.is_member(group_id, id).await? {
                new_ids.push(id);
            }
        }
        let current = usize::try_from(chats.member_count(group_id).await?).unwrap_or(usize::MAX);
        if current.saturating_add(new_ids.len()) > MAX_GROUP_MEMBERS + 1 {
            return Err(AppError::limit_exceeded(format!(
                "A group can have at most {} members",
                MAX_GROUP_MEMBERS + 1
            )));
        }

        let added = chats.add_members(group_id, &new_ids).await?;
        let members = chats.members(group_id).await?;
        Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "added": added, "members": members })),
        )
            .into_response())
    }
}

/// Trimmed, de-duplicated usernames without the caller
fn distinct_usernames(raw: &[String], caller: &User) -> Vec<String> {
    raw.iter()
        .map(|u| u.trim().to_lowercase())
        .filter(|u| !u.is_empty() && *u != caller.username)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

async fn resolve_members(database: &Database, usernames: &[String]) -> Result<Vec<Uuid>, AppError> {
    let (found, missing) = database.users().resolve_usernames(usernames).await?;
    if !missing.is_empty() {
        return Err(AppError::not_found(format!(
            "User(s) {}",
            missing.join(", ")
        )));
    }
    Ok(found.into_iter().map(|u| u.id).collect())
}

async fn require_group(database: &Database, group_id: i64) -> Result<GroupChat, AppError> {
    database
        .group_chats()
        .get_group(group_id)
        .await?
        .filter(|g| g.is_active)
        .ok_or_else(|| AppError::not_found("Group chat"))
}

async fn require_group_member(
    database: &Database,
    group_id: i64,
    user_id: Uuid,
) -> Result<(), AppError> {
    if database.group_chats().is_member(group_id, user_id).await? {
        Ok(())
    } else {
        Err(AppError::permission_denied("You are not a member of this group"))
    }
}
