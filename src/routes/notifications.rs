// ABOUTME: Notification route handlers for the in-app inbox
// ABOUTME: Listing, polling for new items, read state and the combined badge count
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use cpoint_core::errors::AppError;
use cpoint_core::models::Notification;
use serde::{Deserialize, Serialize};

use crate::resources::ServerResources;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Inbox filter
#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    /// Include read notifications
    #[serde(default)]
    pub all: bool,
}

/// Polling window
#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    /// Only notifications created after this instant
    pub since: DateTime<Utc>,
}

/// Notification listing
#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationListResponse {
    /// Newest first
    pub notifications: Vec<Notification>,
}

/// Badge counters
#[derive(Debug, Serialize, Deserialize)]
pub struct BadgeResponse {
    /// Unread notifications
    pub notifications: i64,
    /// Unread direct messages
    pub messages: i64,
    /// Sum of both
    pub total: i64,
}

// ============================================================================
// Routes
// ============================================================================

/// Notification routes
pub struct NotificationRoutes;

impl NotificationRoutes {
    /// Create all notification routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/notifications", get(Self::handle_list))
            .route("/api/notifications/check", get(Self::handle_check))
            .route("/api/notifications/badge", get(Self::handle_badge))
            .route("/api/notifications/read-all", post(Self::handle_read_all))
            .route("/api/notifications/read", delete(Self::handle_delete_read))
            .route("/api/notifications/:id/read", post(Self::handle_mark_read))
            .with_state(resources)
    }

    /// Handle GET /api/notifications
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<ListQuery>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let notifications = resources
            .database
            .notifications()
            .list(auth.user.id, query.all)
            .await?;
        Ok((StatusCode::OK, Json(NotificationListResponse { notifications })).into_response())
    }

    /// Handle GET /api/notifications/check
    async fn handle_check(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<CheckQuery>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let notifications = resources
            .database
            .notifications()
            .check_since(auth.user.id, query.since)
            .await?;
        Ok((StatusCode::OK, Json(NotificationListResponse { notifications })).into_response())
    }

    /// Handle POST /api/notifications/:id/read
    async fn handle_mark_read(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(notification_id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        if !resources
            .database
            .notifications()
            .mark_read(notification_id, auth.user.id)
            .await?
        {
            return Err(AppError::not_found("Notification"));
        }
        Ok((StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response())
    }

    /// Handle POST /api/notifications/read-all
    async fn handle_read_all(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let updated = resources
            .database
            .notifications()
            .mark_all_read(auth.user.id)
            .await?;
        Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "updated": updated })),
        )
            .into_response())
    }

    /// Handle DELETE /api/notifications/read
    async fn handle_delete_read(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let deleted = resources
            .database
            .notifications()
            .delete_read(auth.user.id)
            .await?;
        Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "deleted": deleted })),
        )
            .into_response())
    }

    /// Handle GET /api/notifications/badge
    async fn handle_badge(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let notifications = resources
            .database
            .notifications()
            .unread_count(auth.user.id)
            .await?;
        let messages = resources
            .database
            .messages()
            .unread_count(auth.user.id)
            .await?;
        Ok((
            StatusCode::OK,
            Json(BadgeResponse {
                notifications,
                messages,
                total: notifications + messages,
            }),
        )
            .into_response())
    }
}
