// ABOUTME: Superuser route handlers for user management, platform stats and broadcasts
// ABOUTME: Every endpoint requires the global admin flag on the authenticated account
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

//! Admin routes
//!
//! The superuser cannot deactivate or delete their own account through these
//! endpoints, so the platform always keeps at least one working admin.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use cpoint_core::constants::limits::{MAX_BROADCAST_MESSAGE_LEN, MAX_BROADCAST_TITLE_LEN};
use cpoint_core::constants::notification_types::ADMIN_BROADCAST_PREFIX;
use cpoint_core::errors::{AppError, AppResult};
use cpoint_core::models::User;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::middleware::require_admin;
use crate::resources::ServerResources;
use crate::services::accounts;
use crate::services::validation::optional;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Account status change
#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    /// New status
    pub is_active: bool,
}

/// Platform-wide announcement
#[derive(Debug, Deserialize, Default)]
pub struct BroadcastRequest {
    /// Short title
    pub title: Option<String>,
    /// Body
    pub message: Option<String>,
    /// Optional in-app link
    pub link: Option<String>,
}

/// Result of a broadcast
#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastResponse {
    /// Always true
    pub success: bool,
    /// Recipients notified
    pub notified: usize,
    /// Notification type used for this broadcast
    pub notification_type: String,
}

/// All accounts
#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponse {
    /// Newest first
    pub users: Vec<User>,
}

/// Platform counters
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Accounts
    pub users: i64,
    /// Communities
    pub communities: i64,
    /// Posts
    pub posts: i64,
    /// Polls
    pub polls: i64,
    /// Calendar events
    pub events: i64,
}

// ============================================================================
// Routes
// ============================================================================

/// Admin routes
pub struct AdminRoutes;

impl AdminRoutes {
    /// Create all admin routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/admin/users", get(Self::handle_list_users))
            .route("/api/admin/users/:id", delete(Self::handle_delete_user))
            .route("/api/admin/users/:id/active", post(Self::handle_set_active))
            .route("/api/admin/stats", get(Self::handle_stats))
            .route("/api/admin/broadcast", post(Self::handle_broadcast))
            .with_state(resources)
    }

    /// Handle GET /api/admin/users
    async fn handle_list_users(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        require_admin(&auth.user)?;
        let users = resources.database.users().list_users().await?;
        Ok((StatusCode::OK, Json(UserListResponse { users })).into_response())
    }

    /// Handle POST /api/admin/users/:id/active
    async fn handle_set_active(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(user_id): Path<Uuid>,
        Json(body): Json<SetActiveRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        require_admin(&auth.user)?;
        if user_id == auth.user.id && !body.is_active {
            return Err(AppError::invalid_input("You cannot deactivate your own account"));
        }

        let users = resources.database.users();
        if !users.set_active(user_id, body.is_active).await? {
            return Err(AppError::not_found("User"));
        }
        if !body.is_active {
            users.delete_user_remember_tokens(user_id).await?;
        }
        info!(target_user = %user_id, is_active = body.is_active, "Account status changed");
        Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "is_active": body.is_active })),
        )
            .into_response())
    }

    /// Handle DELETE /api/admin/users/:id
    async fn handle_delete_user(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(user_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        require_admin(&auth.user)?;
        if user_id == auth.user.id {
            return Err(AppError::invalid_input("You cannot delete your own account"));
        }
        let deleted = accounts::delete_account(&resources.database, &auth.user, user_id).await?;
        warn!(target_user = %deleted.username, admin = %auth.user.username, "User deleted");
        Ok((StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response())
    }

    /// Handle GET /api/admin/stats
    async fn handle_stats(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        require_admin(&auth.user)?;
        let db = &resources.database;
        let stats = StatsResponse {
            users: db.users().count_users().await?,
            communities: db.communities().count_communities().await?,
            posts: db.posts().count_posts().await?,
            polls: db.polls().count_polls().await?,
            events: db.calendar().count_events().await?,
        };
        Ok((StatusCode::OK, Json(stats)).into_response())
    }

    /// Handle POST /api/admin/broadcast
    async fn handle_broadcast(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<BroadcastRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        require_admin(&auth.user)?;
        let message = compose_broadcast(body.title.as_deref(), body.message.as_deref())?;
        let link = optional(body.link.as_deref());

        let notification_type = format!(
            "{ADMIN_BROADCAST_PREFIX}:{}",
            Utc::now().format("%Y%m%d%H%M%S")
        );
        let recipients = resources.database.users().list_active_user_ids().await?;
        let notified = resources
            .database
            .notifications()
            .broadcast(
                &recipients,
                &notification_type,
                &message,
                Some(&auth.user.username),
                link.as_deref(),
            )
            .await?;
        info!(notified, %notification_type, "Admin broadcast sent");
        Ok((
            StatusCode::OK,
            Json(BroadcastResponse {
                success: true,
                notified,
                notification_type,
            }),
        )
            .into_response())
    }
}

/// Join title and body into the stored notification text
///
/// # Errors
///
/// Returns `MissingRequiredField` when both are blank and `InvalidInput` when
/// the title or the composed text is too long
pub fn compose_broadcast(title: Option<&str>, message: Option<&str>) -> AppResult<String> {
    let title = optional(title);
    let body = optional(message);
    if let Some(title) = &title {
        if title.chars().count() > MAX_BROADCAST_TITLE_LEN {
            return Err(AppError::invalid_input(format!(
                "Title must be {MAX_BROADCAST_TITLE_LEN} characters or fewer"
            )));
        }
    }
    let composed = match (title, body) {
        (Some(title), Some(body)) => format!("{title}\n\n{body}"),
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => return Err(AppError::missing_field("message")),
    };
    if composed.chars().count() > MAX_BROADCAST_MESSAGE_LEN {
        return Err(AppError::invalid_input(format!(
            "Message is too long (max {MAX_BROADCAST_MESSAGE_LEN} characters)"
        )));
    }
    Ok(composed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_broadcast() {
        assert_eq!(
            compose_broadcast(Some("Maintenance"), Some("Back at 5pm")).unwrap(),
            "Maintenance\n\nBack at 5pm"
        );
        assert_eq!(compose_broadcast(None, Some(" hi ")).unwrap(), "hi");
        assert_eq!(compose_broadcast(Some("Title only"), Some("  ")).unwrap(), "Title only");
        assert!(compose_broadcast(None, None).is_err());
    }

    #[test]
    fn test_broadcast_limits() {
        let long_title = "t".repeat(MAX_BROADCAST_TITLE_LEN + 1);
        assert!(compose_broadcast(Some(&long_title), None).is_err());
        let long_body = "b".repeat(MAX_BROADCAST_MESSAGE_LEN + 1);
        assert!(compose_broadcast(None, Some(&long_body)).is_err());
    }
}
