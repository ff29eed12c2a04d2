// ABOUTME: Community route handlers: CRUD, join codes, membership management and invitations
// ABOUTME: Thin handlers that delegate cascade rules to the membership service
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

//! Community routes
//!
//! All endpoints require authentication. Permission checks follow the
//! community roles (`owner`, `admin`, `member`) with the global superuser
//! allowed everywhere.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use cpoint_core::constants::limits::MAX_COMMUNITY_NAME_LEN;
use cpoint_core::errors::AppError;
use cpoint_core::models::{
    qr_invite_email, Community, CommunityInvitation, CommunityMember, MembershipSummary,
    ViewerRole,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::database::{CommunityUpdate, NewInvitation};
use crate::resources::ServerResources;
use crate::services::mailer::{invitation_email, send_best_effort};
use crate::services::membership::{self, CommunityDraft};
use crate::services::validation::{
    is_valid_email, optional, required, validate_color, validate_length,
};

// ============================================================================
// Request / Response Types
// ============================================================================

/// New community form
#[derive(Debug, Deserialize, Default)]
pub struct CreateCommunityRequest {
    /// Display name
    pub name: Option<String>,
    /// Free-form type
    #[serde(alias = "type")]
    pub community_type: Option<String>,
    /// Description
    pub description: Option<String>,
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

/// Community edit form; absent fields stay unchanged
#[derive(Debug, Deserialize, Default)]
pub struct UpdateCommunityRequest {
    /// Display name
    pub name: Option<String>,
    /// Free-form type
    #[serde(alias = "type")]
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

/// Join code form
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    /// Community join code
    pub join_code: String,
}

/// Member selection
#[derive(Debug, Deserialize)]
pub struct MemberRequest {
    /// Target username
    pub username: String,
}

/// Role change form
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    /// `owner`, `admin` or `member`
    pub role: String,
}

/// Invitation form: an email address, or `qr: true` for a reusable code
#[derive(Debug, Deserialize, Default)]
pub struct CreateInvitationRequest {
    /// Address to invite
    pub email: Option<String>,
    /// Create a reusable QR invitation instead
    #[serde(default)]
    pub qr: bool,
    /// Explicit parents to join instead of the parent chain
    pub include_parent_ids: Option<Vec<i64>>,
    /// Nested communities to join as well
    #[serde(default)]
    pub include_nested_ids: Vec<i64>,
}

/// Invitation redemption form
#[derive(Debug, Deserialize)]
pub struct AcceptInvitationRequest {
    /// Invitation token
    pub token: String,
}

/// Community detail for members
#[derive(Debug, Serialize, Deserialize)]
pub struct CommunityResponse {
    /// Community row
    pub community: Community,
    /// Caller relation
    pub current_user_role: ViewerRole,
    /// Number of members
    pub member_count: i64,
}

/// The caller's communities
#[derive(Debug, Serialize, Deserialize)]
pub struct MyCommunitiesResponse {
    /// Memberships with role and parent id
    pub communities: Vec<MembershipSummary>,
}

/// Member listing
#[derive(Debug, Serialize, Deserialize)]
pub struct MembersResponse {
    /// Ordered members
    pub members: Vec<CommunityMember>,
    /// Caller relation
    pub current_user_role: ViewerRole,
}

/// Sub-community listing
#[derive(Debug, Serialize, Deserialize)]
pub struct SubCommunitiesResponse {
    /// Direct children
    pub communities: Vec<Community>,
}

/// Result of joining or accepting an invitation
#[derive(Debug, Serialize, Deserialize)]
pub struct JoinResponse {
    /// Always true
    pub success: bool,
    /// Community joined
    pub community: Community,
    /// Every community newly joined, target first
    pub joined_community_ids: Vec<i64>,
}

/// Created invitation
#[derive(Debug, Serialize, Deserialize)]
pub struct InvitationResponse {
    /// Stored invitation
    pub invitation: CommunityInvitation,
    /// Link that redeems it
    pub invite_url: String,
}

/// Invitation listing
#[derive(Debug, Serialize, Deserialize)]
pub struct InvitationsResponse {
    /// Newest first
    pub invitations: Vec<CommunityInvitation>,
}

// ============================================================================
// Routes
// ============================================================================

/// Community routes handler
pub struct CommunityRoutes;

impl CommunityRoutes {
    /// Create all community routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/communities",
                get(Self::handle_list_mine).post(Self::handle_create),
            )
            .route("/api/communities/join", post(Self::handle_join))
            .route(
                "/api/communities/:id",
                get(Self::handle_get)
                    .put(Self::handle_update)
                    .delete(Self::handle_delete),
            )
            .route("/api/communities/:id/leave", post(Self::handle_leave))
            .route(
                "/api/communities/:id/sub-communities",
                get(Self::handle_sub_communities),
            )
            .route(
                "/api/communities/:id/members",
                get(Self::handle_list_members).post(Self::handle_add_member),
            )
            .route(
                "/api/communities/:id/members/:username",
                delete(Self::handle_remove_member),
            )
            .route(
                "/api/communities/:id/members/:username/role",
                put(Self::handle_update_role),
            )
            .route(
                "/api/communities/:id/invitations",
                get(Self::handle_list_invitations).post(Self::handle_create_invitation),
            )
            .route(
                "/api/communities/:id/invitations/:invitation_id",
                delete(Self::handle_revoke_invitation),
            )
            .route("/api/invitations/accept", post(Self::handle_accept_invitation))
            .with_state(resources)
    }

    /// Handle POST /api/communities
    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<CreateCommunityRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let name = required(body.name.as_deref(), "name")?;
        validate_length(name, MAX_COMMUNITY_NAME_LEN, "name")?;
        let community_type = required(body.community_type.as_deref(), "community_type")?;
        validate_color(body.background_color.as_deref(), "background_color")?;
        validate_color(body.text_color.as_deref(), "text_color")?;
        validate_color(body.accent_color.as_deref(), "accent_color")?;
        validate_max_members(body.max_members)?;

        let draft = CommunityDraft {
            name: name.to_owned(),
            community_type: community_type.to_owned(),
            description: optional(body.description.as_deref()),
            parent_community_id: body.parent_community_id,
            background_color: body.background_color,
            text_color: body.text_color,
            accent_color: body.accent_color,
            max_members: body.max_members,
        };
        let community =
            membership::create_community(&resources.database, &auth.user, draft).await?;
        Ok((StatusCode::CREATED, Json(community)).into_response())
    }

    /// Handle GET /api/communities
    async fn handle_list_mine(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let communities = resources
            .database
            .communities()
            .list_user_communities(auth.user.id)
            .await?;
        Ok((StatusCode::OK, Json(MyCommunitiesResponse { communities })).into_response())
    }

    /// Handle GET /api/communities/:id
    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let community = membership::require_community(&resources.database, id).await?;
        membership::require_member(&resources.database, &auth.user, id).await?;

        let current_user_role =
            membership::viewer_role(&resources.database, &auth.user, &community).await?;
        let member_count = resources.database.communities().count_members(id).await?;
        Ok((
            StatusCode::OK,
            Json(CommunityResponse {
                community,
                current_user_role,
                member_count,
            }),
        )
            .into_response())
    }

    /// Handle PUT /api/communities/:id
    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<i64>,
        Json(body): Json<UpdateCommunityRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let community = membership::require_community(&resources.database, id).await?;
        membership::require_manager(&resources.database, &auth.user, &community).await?;

        let name = optional(body.name.as_deref());
        if let Some(name) = &name {
            validate_length(name, MAX_COMMUNITY_NAME_LEN, "name")?;
        }
        validate_color(body.background_color.as_deref(), "background_color")?;
        validate_color(body.text_color.as_deref(), "text_color")?;
        validate_color(body.accent_color.as_deref(), "accent_color")?;
        validate_max_members(body.max_members)?;

        let update = CommunityUpdate {
            name,
            community_type: optional(body.community_type.as_deref()),
            description: body.description.map(|d| d.trim().to_owned()),
            background_color: body.background_color,
            text_color: body.text_color,
            accent_color: body.accent_color,
            max_members: body.max_members,
        };
        let updated = resources
            .database
            .communities()
            .update_community(id, &update)
            .await?;
        info!(community_id = id, user = %auth.user.username, "Community updated");
        Ok((StatusCode::OK, Json(updated)).into_response())
    }

    /// Handle DELETE /api/communities/:id
    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let community = membership::require_community(&resources.database, id).await?;
        let deleted =
            membership::delete_community(&resources.database, &auth.user, &community).await?;
        Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "deleted_communities": deleted })),
        )
            .into_response())
    }

    /// Handle POST /api/communities/join
    async fn handle_join(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<JoinRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let code = required(Some(&body.join_code), "join_code")?;
        let (community, joined_community_ids) =
            membership::join_by_code(&resources.database, &auth.user, code).await?;
        Ok((
            StatusCode::OK,
            Json(JoinResponse {
                success: true,
                community,
                joined_community_ids,
            }),
        )
            .into_response())
    }

    /// Handle POST /api/communities/:id/leave
    async fn handle_leave(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let community = membership::require_community(&resources.database, id).await?;
        let removed =
            membership::leave_community(&resources.database, &auth.user, &community).await?;
        Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "left_communities": removed })),
        )
            .into_response())
    }

    /// Handle GET /api/communities/:id/sub-communities
    async fn handle_sub_communities(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<i64>,
    ) -> Result<Response, AppError> {
        resources.authenticate(&headers).await?;
        membership::require_community(&resources.database, id).await?;
        let communities = resources.database.communities().list_children(id).await?;
        Ok((StatusCode::OK, Json(SubCommunitiesResponse { communities })).into_response())
    }

    /// Handle GET /api/communities/:id/members
    async fn handle_list_members(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let community = membership::require_community(&resources.database, id).await?;
        let (members, current_user_role) =
            membership::list_members(&resources.database, &auth.user, &community).await?;
        Ok((
            StatusCode::OK,
            Json(MembersResponse {
                members,
                current_user_role,
            }),
        )
            .into_response())
    }

    /// Handle POST /api/communities/:id/members
    async fn handle_add_member(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<i64>,
        Json(body): Json<MemberRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let community = membership::require_community(&resources.database, id).await?;
        let added =
            membership::add_member(&resources.database, &auth.user, &community, &body.username)
                .await?;
        Ok((
            StatusCode::CREATED,
            Json(serde_json::json!({ "success": true, "username": added.username })),
        )
            .into_response())
    }

    /// Handle DELETE /api/communities/:id/members/:username
    async fn handle_remove_member(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((id, username)): Path<(i64, String)>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let community = membership::require_community(&resources.database, id).await?;
        let removed =
            membership::remove_member(&resources.database, &auth.user, &community, &username)
                .await?;
        Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "removed_memberships": removed })),
        )
            .into_response())
    }

    /// Handle PUT /api/communities/:id/members/:username/role
    async fn handle_update_role(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((id, username)): Path<(i64, String)>,
        Json(body): Json<RoleRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let community = membership::require_community(&resources.database, id).await?;
        let role = membership::update_member_role(
            &resources.database,
            &auth.user,
            &community,
            &username,
            &body.role,
        )
        .await?;
        Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "username": username, "role": role })),
        )
            .into_response())
    }

    /// Handle POST /api/communities/:id/invitations
    async fn handle_create_invitation(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<i64>,
        Json(body): Json<CreateInvitationRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let community = membership::require_community(&resources.database, id).await?;
        membership::require_manager(&resources.database, &auth.user, &community).await?;

        let token = membership::generate_invitation_token();
        let invited_email = if body.qr {
            qr_invite_email(&token)
        } else {
            let email = required(body.email.as_deref(), "email")?.to_lowercase();
            if !is_valid_email(&email) {
                return Err(AppError::invalid_input("Invalid email address"));
            }
            email
        };

        let invitation = resources
            .database
            .communities()
            .create_invitation(&NewInvitation {
                community_id: id,
                token: token.clone(),
                invited_email,
                invited_by: auth.user.id,
                include_parent_ids: body.include_parent_ids,
                include_nested_ids: body.include_nested_ids,
            })
            .await?;
        let invite_url = resources.link(&format!(
            "/signup?invite={}",
            urlencoding::encode(&token)
        ));

        if !body.qr {
            let email = invitation_email(
                &invitation.invited_email,
                &community.name,
                &auth.user.display_name(),
                &invite_url,
            );
            send_best_effort(resources.mailer.as_ref(), &email).await;
        }
        info!(community_id = id, qr = body.qr, "Invitation created");
        Ok((
            StatusCode::CREATED,
            Json(InvitationResponse {
                invitation,
                invite_url,
            }),
        )
            .into_response())
    }

    /// Handle GET /api/communities/:id/invitations
    async fn handle_list_invitations(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let community = membership::require_community(&resources.database, id).await?;
        membership::require_manager(&resources.database, &auth.user, &community).await?;
        let invitations = resources.database.communities().list_invitations(id).await?;
        Ok((StatusCode::OK, Json(InvitationsResponse { invitations })).into_response())
    }

    /// Handle DELETE /api/communities/:id/invitations/:invitation_id
    async fn handle_revoke_invitation(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path((id, invitation_id)): Path<(i64, i64)>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let community = membership::require_community(&resources.database, id).await?;
        membership::require_manager(&resources.database, &auth.user, &community).await?;
        if !resources
            .database
            .communities()
            .delete_invitation(id, invitation_id)
            .await?
        {
            return Err(AppError::not_found("Invitation"));
        }
        Ok((StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response())
    }

    /// Handle POST /api/invitations/accept
    async fn handle_accept_invitation(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<AcceptInvitationRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let (community, joined_community_ids) =
            membership::accept_invitation(&resources.database, &auth.user, &body.token).await?;
        Ok((
            StatusCode::OK,
            Json(JoinResponse {
                success: true,
                community,
                joined_community_ids,
            }),
        )
            .into_response())
    }
}

fn validate_max_members(max_members: Option<i64>) -> Result<(), AppError> {
    match max_members {
        Some(max) if max < 1 => Err(AppError::invalid_input(
            "max_members must be at least 1",
        )),
        _ => Ok(()),
    }
}
