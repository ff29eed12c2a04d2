// ABOUTME: Community feed route handlers for posts, replies and reactions
// ABOUTME: Cursor-paged feeds, author/admin moderation and reaction toggles with notifications
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
use cpoint_core::constants::{limits::MAX_POST_LEN, notification_types};
use cpoint_core::errors::AppError;
use cpoint_core::models::{
    normalize_reaction_type, NewNotification, Post, ReactionChange, ReactionSummary,
    ReactionTarget, Reply, User,
};
use cpoint_core::pagination::{Cursor, CursorPage, PaginationParams};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::database::{Database, NewPost};
use crate::resources::ServerResources;
use crate::services::membership;
use crate::services::notifier::{notify, notify_all};
use crate::services::validation::{required, text_or_image, validate_length};

// ============================================================================
// Request / Response Types
// ============================================================================

/// New post or reply
#[derive(Debug, Deserialize, Default)]
pub struct CreatePostRequest {
    /// Text body
    pub content: Option<String>,
    /// Upload reference returned by `/api/uploads`
    pub image_path: Option<String>,
}

/// Post edit
#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    /// New text body
    pub content: Option<String>,
}

/// Reaction toggle
#[derive(Debug, Deserialize)]
pub struct ReactRequest {
    /// Reaction type such as `like`
    pub reaction_type: String,
}

/// A post with its reaction summary
#[derive(Debug, Serialize, Deserialize)]
pub struct PostView {
    /// Post row
    #[serde(flatten)]
    pub post: Post,
    /// Reactions
    pub reactions: ReactionSummary,
}

/// A reply with its reaction summary
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyView {
    /// Reply row
    #[serde(flatten)]
    pub reply: Reply,
    /// Reactions
    pub reactions: ReactionSummary,
}

/// Full post with replies
#[derive(Debug, Serialize, Deserialize)]
pub struct PostDetailResponse {
    /// Post and its reactions
    pub post: PostView,
    /// Replies oldest first
    pub replies: Vec<ReplyView>,
}

/// Outcome of a reaction toggle
#[derive(Debug, Serialize, Deserialize)]
pub struct ReactResponse {
    /// Added, replaced or removed
    pub change: ReactionChange,
    /// Updated summary
    pub reactions: ReactionSummary,
}

// ============================================================================
// Routes
// ============================================================================

/// Post, reply and reaction routes
pub struct PostRoutes;

impl PostRoutes {
    /// Create all post routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/communities/:id/posts",
                get(Self::handle_feed).post(Self::handle_create_post),
            )
            .route(
                "/api/posts/:id",
                get(Self::handle_get_post)
                    .put(Self::handle_update_post)
                    .delete(Self::handle_delete_post),
            )
            .route("/api/posts/:id/replies", post(Self::handle_create_reply))
            .route("/api/posts/:id/reactions", post(Self::handle_react_post))
            .route("/api/replies/:id", delete(Self::handle_delete_reply))
            .route("/api/replies/:id/reactions", post(Self::handle_react_reply))
            .with_state(resources)
    }

    /// Handle GET /api/communities/:id/posts
    async fn handle_feed(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(community_id): Path<i64>,
        Query(params): Query<PaginationParams>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        membership::require_community(&resources.database, community_id).await?;
        membership::require_member(&resources.database, &auth.user, community_id).await?;

        let before = match &params.cursor {
            Some(cursor) => Some(
                cursor
                    .decode()
                    .ok_or_else(|| AppError::invalid_input("Invalid cursor"))?,
            ),
            None => None,
        };
        let limit = params.effective_limit();
        let fetch = i64::try_from(limit + 1).unwrap_or(i64::MAX);
        let rows = resources
            .database
            .posts()
            .list_feed(community_id, before, fetch)
            .await?;

        let page = CursorPage::from_overfetch(rows, limit, |p| Cursor::new(p.created_at, p.id));
        let mut items = Vec::with_capacity(page.items.len());
        for post in page.items {
            let reactions = resources
                .database
                .posts()
                .reaction_summary(ReactionTarget::Post(post.id), auth.user.id)
                .await?;
            items.push(PostView { post, reactions });
        }
        let page = CursorPage::new(items, page.next_cursor, page.has_more);
        Ok((StatusCode::OK, Json(page)).into_response())
    }

    /// Handle POST /api/communities/:id/posts
    async fn handle_create_post(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(community_id): Path<i64>,
        Json(body): Json<CreatePostRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let community = membership::require_community(&resources.database, community_id).await?;
        membership::require_member(&resources.database, &auth.user, community_id).await?;

        let (content, image_path) = text_or_image(
            body.content.as_deref(),
            body.image_path.as_deref(),
            MAX_POST_LEN,
        )?;
        let post = resources
            .database
            .posts()
            .create_post(
                community_id,
                &NewPost {
                    author_id: auth.user.id,
                    content: content.unwrap_or_default(),
                    image_path,
                },
            )
            .await?;

        let members = resources.database.communities().member_ids(community_id).await?;
        let message = format!("{} posted in {}", auth.user.username, community.name);
        let notifications: Vec<NewNotification> = members
            .into_iter()
            .filter(|id| *id != auth.user.id)
            .map(|id| {
                NewNotification::new(id, notification_types::COMMUNITY_POST, message.clone())
                    .from_user(auth.user.username.clone())
                    .with_post(post.id)
                    .with_community(community_id)
                    .with_link(post_link(post.id))
            })
            .collect();
        notify_all(&resources.database, notifications).await;

        info!(post_id = post.id, community_id, "Post created");
        Ok((
            StatusCode::CREATED,
            Json(PostView {
                post,
                reactions: ReactionSummary::default(),
            }),
        )
            .into_response())
    }

    /// Handle GET /api/posts/:id
    async fn handle_get_post(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(post_id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let post = require_post(&resources.database, post_id).await?;
        membership::require_member(&resources.database, &auth.user, post.community_id).await?;

        let posts = resources.database.posts();
        let reactions = posts
            .reaction_summary(ReactionTarget::Post(post.id), auth.user.id)
            .await?;
        let mut replies = Vec::new();
        for reply in posts.list_replies(post.id).await? {
            let reactions = posts
                .reaction_summary(ReactionTarget::Reply(reply.id), auth.user.id)
                .await?;
            replies.push(ReplyView { reply, reactions });
        }
        Ok((
            StatusCode::OK,
            Json(PostDetailResponse {
                post: PostView { post, reactions },
                replies,
            }),
        )
            .into_response())
    }

    /// Handle PUT /api/posts/:id
    async fn handle_update_post(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(post_id): Path<i64>,
        Json(body): Json<UpdatePostRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let post = require_post(&resources.database, post_id).await?;
        if post.author_id != auth.user.id {
            return Err(AppError::permission_denied("Only the author can edit a post"));
        }
        let content = required(body.content.as_deref(), "content")?;
        validate_length(content, MAX_POST_LEN, "content")?;

        resources
            .database
            .posts()
            .update_post_content(post_id, content)
            .await?;
        let post = require_post(&resources.database, post_id).await?;
        Ok((StatusCode::OK, Json(post)).into_response())
    }

    /// Handle DELETE /api/posts/:id
    async fn handle_delete_post(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(post_id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let post = require_post(&resources.database, post_id).await?;
        require_moderator(&resources.database, &auth.user, post.author_id, post.community_id)
            .await?;

        resources.database.posts().delete_post(post_id).await?;
        info!(post_id, user = %auth.user.username, "Post deleted");
        Ok((StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response())
    }

    /// Handle POST /api/posts/:id/replies
    async fn handle_create_reply(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(post_id): Path<i64>,
        Json(body): Json<CreatePostRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let post = require_post(&resources.database, post_id).await?;
        membership::require_member(&resources.database, &auth.user, post.community_id).await?;

        let (content, image_path) = text_or_image(
            body.content.as_deref(),
            body.image_path.as_deref(),
            MAX_POST_LEN,
        )?;
        let reply = resources
            .database
            .posts()
            .create_reply(
                post_id,
                &NewPost {
                    author_id: auth.user.id,
                    content: content.unwrap_or_default(),
                    image_path,
                },
            )
            .await?;

        if post.author_id != auth.user.id {
            notify(
                &resources.database,
                NewNotification::new(
                    post.author_id,
                    notification_types::REPLY,
                    format!("{} replied to your post", auth.user.username),
                )
                .from_user(auth.user.username.clone())
                .with_post(post.id)
                .with_community(post.community_id)
                .with_link(post_link(post.id)),
            )
            .await;
        }

        Ok((
            StatusCode::CREATED,
            Json(ReplyView {
                reply,
                reactions: ReactionSummary::default(),
            }),
        )
            .into_response())
    }

    /// Handle DELETE /api/replies/:id
    async fn handle_delete_reply(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(reply_id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let reply = resources
            .database
            .posts()
            .get_reply(reply_id)
            .await?
            .ok_or_else(|| AppError::not_found("Reply"))?;
        let post = require_post(&resources.database, reply.post_id).await?;
        require_moderator(&resources.database, &auth.user, reply.author_id, post.community_id)
            .await?;

        resources.database.posts().delete_reply(reply_id).await?;
        Ok((StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response())
    }

    /// Handle POST /api/posts/:id/reactions
    async fn handle_react_post(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(post_id): Path<i64>,
        Json(body): Json<ReactRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let post = require_post(&resources.database, post_id).await?;
        membership::require_member(&resources.database, &auth.user, post.community_id).await?;

        let response = react(
            &resources.database,
            &auth.user,
            ReactionTarget::Post(post.id),
            &body.reaction_type,
            (post.author_id, post.id, post.community_id),
        )
        .await?;
        Ok((StatusCode::OK, Json(response)).into_response())
    }

    /// Handle POST /api/replies/:id/reactions
    async fn handle_react_reply(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(reply_id): Path<i64>,
        Json(body): Json<ReactRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let reply = resources
            .database
            .posts()
            .get_reply(reply_id)
            .await?
            .ok_or_else(|| AppError::not_found("Reply"))?;
        let post = require_post(&resources.database, reply.post_id).await?;
        membership::require_member(&resources.database, &auth.user, post.community_id).await?;

        let response = react(
            &resources.database,
            &auth.user,
            ReactionTarget::Reply(reply.id),
            &body.reaction_type,
            (reply.author_id, post.id, post.community_id),
        )
        .await?;
        Ok((StatusCode::OK, Json(response)).into_response())
    }
}

fn post_link(post_id: i64) -> String {
    format!("/post/{post_id}")
}

async fn require_post(database: &Database, post_id: i64) -> Result<Post, AppError> {
    database
        .posts()
        .get_post(post_id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))
}

/// Authors, community admins and the superuser may remove content
async fn require_moderator(
    database: &Database,
    user: &User,
    author_id: Uuid,
    community_id: i64,
) -> Result<(), AppError> {
    if author_id == user.id {
        return Ok(());
    }
    let community = membership::require_community(database, community_id).await?;
    membership::require_manager(database, user, &community).await
}

/// Toggle a reaction and notify the author when one is added
async fn react(
    database: &Database,
    user: &User,
    target: ReactionTarget,
    raw_type: &str,
    (author_id, post_id, community_id): (Uuid, i64, i64),
) -> Result<ReactResponse, AppError> {
    let reaction_type = normalize_reaction_type(raw_type)?;
    let posts = database.posts();
    let change = posts.react(target, user.id, &reaction_type).await?;

    if change != ReactionChange::Removed && author_id != user.id {
        let what = match target {
            ReactionTarget::Post(_) => "post",
            ReactionTarget::Reply(_) => "reply",
        };
        notify(
            database,
            NewNotification::new(
                author_id,
                notification_types::REACTION,
                format!("{} reacted {reaction_type} to your {what}", user.username),
            )
            .from_user(user.username.clone())
            .with_post(post_id)
            .with_community(community_id)
            .with_link(post_link(post_id)),
        )
        .await;
    }

    let reactions = posts.reaction_summary(target, user.id).await?;
    Ok(ReactResponse { change, reactions })
}
