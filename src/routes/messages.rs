// ABOUTME: Direct message route handlers between two users
// ABOUTME: Sending, threads paged by message id, conversation summaries and unread counts
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
use cpoint_core::constants::limits::{DEFAULT_MESSAGE_LIMIT, MAX_MESSAGE_LIMIT, MAX_POST_LEN};
use cpoint_core::errors::AppError;
use cpoint_core::models::{ConversationSummary, DirectMessage, User};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::resources::ServerResources;
use crate::services::validation::text_or_image;

// ============================================================================
// Request / Response Types
// ============================================================================

/// New direct message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Recipient handle
    pub receiver_username: String,
    /// Text body
    pub message: Option<String>,
    /// Upload reference
    pub image_path: Option<String>,
}

/// Backwards paging by message id
#[derive(Debug, Deserialize, Default)]
pub struct ThreadQuery {
    /// Only messages with a smaller id
    pub before_id: Option<i64>,
    /// Page size, default 50, max 100
    pub limit: Option<i64>,
}

impl ThreadQuery {
    /// Requested page size clamped to `1..=MAX_MESSAGE_LIMIT`
    #[must_use]
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_MESSAGE_LIMIT)
            .clamp(1, MAX_MESSAGE_LIMIT)
    }
}

/// One page of a thread
#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadResponse {
    /// Partner handle
    pub partner_username: String,
    /// Oldest first
    pub messages: Vec<DirectMessage>,
}

/// Conversations of the caller
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationsResponse {
    /// Newest conversation first
    pub conversations: Vec<ConversationSummary>,
}

/// Unread direct messages
#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    /// Count
    pub unread_count: i64,
}

// ============================================================================
// Routes
// ============================================================================

/// Direct message routes
pub struct MessageRoutes;

impl MessageRoutes {
    /// Create all direct message routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/messages", post(Self::handle_send))
            .route("/api/messages/conversations", get(Self::handle_conversations))
            .route("/api/messages/unread-count", get(Self::handle_unread_count))
            .route("/api/messages/with/:username", get(Self::handle_thread))
            .route("/api/messages/:message_id", delete(Self::handle_delete))
            .with_state(resources)
    }

    /// Handle POST /api/messages
    async fn handle_send(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<SendMessageRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let receiver = require_user(&resources.database, &body.receiver_username).await?;
        if receiver.id == auth.user.id {
            return Err(AppError::invalid_input("You cannot message yourself"));
        }
        let (message, image_path) = text_or_image(
            body.message.as_deref(),
            body.image_path.as_deref(),
            MAX_POST_LEN,
        )?;

        let sent = resources
            .database
            .messages()
            .send(
                auth.user.id,
                receiver.id,
                message.as_deref(),
                image_path.as_deref(),
            )
            .await?;
        Ok((StatusCode::CREATED, Json(sent)).into_response())
    }

    /// Handle GET /api/messages/with/:username
    async fn handle_thread(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(username): Path<String>,
        Query(query): Query<ThreadQuery>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let partner = require_user(&resources.database, &username).await?;

        let messages = resources.database.messages();
        let thread = messages
            .thread(auth.user.id, partner.id, query.before_id, query.effective_limit())
            .await?;
        messages.mark_thread_read(auth.user.id, partner.id).await?;

        Ok((
            StatusCode::OK,
            Json(ThreadResponse {
                partner_username: partner.username,
                messages: thread,
            }),
        )
            .into_response())
    }

    /// Handle GET /api/messages/conversations
    async fn handle_conversations(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let conversations = resources
            .database
            .messages()
            .conversations(auth.user.id)
            .await?;
        Ok((StatusCode::OK, Json(ConversationsResponse { conversations })).into_response())
    }

    /// Handle GET /api/messages/unread-count
    async fn handle_unread_count(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let unread_count = resources
            .database
            .messages()
            .unread_count(auth.user.id)
            .await?;
        Ok((StatusCode::OK, Json(UnreadCountResponse { unread_count })).into_response())
    }

    /// Handle DELETE /api/messages/:message_id
    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(message_id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        if !resources
            .database
            .messages()
            .delete_message(message_id, auth.user.id)
            .await?
        {
            return Err(AppError::not_found("Message"));
        }
        Ok((StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response())
    }
}

async fn require_user(database: &Database, username: &str) -> Result<User, AppError> {
    database
        .users()
        .get_user_by_username(username.trim())
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}
