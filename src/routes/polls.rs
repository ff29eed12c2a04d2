// ABOUTME: Poll route handlers: creation with a backing post, voting, results and closing
// ABOUTME: Votes are accepted only while a poll is active and before its deadline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use cpoint_core::constants::limits::{MAX_POLL_OPTIONS, MAX_POST_LEN, MIN_POLL_OPTIONS};
use cpoint_core::errors::AppError;
use cpoint_core::models::{Poll, PollResults, User};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::database::{Database, NewPoll};
use crate::resources::ServerResources;
use crate::services::membership;
use crate::services::validation::{required, validate_length};

// ============================================================================
// Request / Response Types
// ============================================================================

/// New poll form
#[derive(Debug, Deserialize, Default)]
pub struct CreatePollRequest {
    /// Question text
    pub question: Option<String>,
    /// Option texts
    #[serde(default)]
    pub options: Vec<String>,
    /// One vote per user (default true)
    pub single_vote: Option<bool>,
    /// Optional deadline
    pub expires_at: Option<DateTime<Utc>>,
}

/// Vote form
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    /// Chosen option
    pub option_id: i64,
}

/// Community poll listing
#[derive(Debug, Serialize, Deserialize)]
pub struct PollListResponse {
    /// Active polls first
    pub polls: Vec<PollResults>,
}

// ============================================================================
// Routes
// ============================================================================

/// Poll routes
pub struct PollRoutes;

impl PollRoutes {
    /// Create all poll routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/communities/:id/polls",
                get(Self::handle_list).post(Self::handle_create),
            )
            .route("/api/polls/:id", get(Self::handle_get))
            .route("/api/polls/:id/vote", post(Self::handle_vote))
            .route("/api/polls/:id/close", post(Self::handle_close))
            .with_state(resources)
    }

    /// Handle POST /api/communities/:id/polls
    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(community_id): Path<i64>,
        Json(body): Json<CreatePollRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        membership::require_community(&resources.database, community_id).await?;
        membership::require_member(&resources.database, &auth.user, community_id).await?;

        let question = required(body.question.as_deref(), "question")?;
        validate_length(question, MAX_POST_LEN, "question")?;
        let options: Vec<String> = body
            .options
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(str::to_owned)
            .collect();
        if !(MIN_POLL_OPTIONS..=MAX_POLL_OPTIONS).contains(&options.len()) {
            return Err(AppError::invalid_input(format!(
                "A poll needs between {MIN_POLL_OPTIONS} and {MAX_POLL_OPTIONS} options"
            )));
        }
        if body.expires_at.is_some_and(|deadline| deadline <= Utc::now()) {
            return Err(AppError::invalid_input("expires_at must be in the future"));
        }

        let poll = resources
            .database
            .polls()
            .create_poll(
                community_id,
                &NewPoll {
                    created_by: auth.user.id,
                    question: question.to_owned(),
                    options,
                    single_vote: body.single_vote.unwrap_or(true),
                    expires_at: body.expires_at,
                },
            )
            .await?;

        info!(poll_id = poll.id, community_id, "Poll created");
        let results = poll_results(&resources.database, poll, &auth.user).await?;
        Ok((StatusCode::CREATED, Json(results)).into_response())
    }

    /// Handle GET /api/communities/:id/polls
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(community_id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        membership::require_community(&resources.database, community_id).await?;
        membership::require_member(&resources.database, &auth.user, community_id).await?;

        let mut polls = Vec::new();
        for poll in resources
            .database
            .polls()
            .list_community_polls(community_id)
            .await?
        {
            polls.push(poll_results(&resources.database, poll, &auth.user).await?);
        }
        Ok((StatusCode::OK, Json(PollListResponse { polls })).into_response())
    }

    /// Handle GET /api/polls/:id
    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(poll_id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let poll = require_poll(&resources.database, poll_id).await?;
        membership::require_member(&resources.database, &auth.user, poll.community_id).await?;
        let results = poll_results(&resources.database, poll, &auth.user).await?;
        Ok((StatusCode::OK, Json(results)).into_response())
    }

    /// Handle POST /api/polls/:id/vote
    async fn handle_vote(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(poll_id): Path<i64>,
        Json(body): Json<VoteRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let poll = require_poll(&resources.database, poll_id).await?;
        membership::require_member(&resources.database, &auth.user, poll.community_id).await?;
        if !poll.accepts_votes(Utc::now()) {
            return Err(AppError::invalid_input("This poll is closed"));
        }

        resources
            .database
            .polls()
            .vote(&poll, body.option_id, auth.user.id)
            .await?;
        let results = poll_results(&resources.database, poll, &auth.user).await?;
        Ok((StatusCode::OK, Json(results)).into_response())
    }

    /// Handle POST /api/polls/:id/close
    async fn handle_close(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(poll_id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let poll = require_poll(&resources.database, poll_id).await?;
        if poll.created_by != auth.user.id {
            let community =
                membership::require_community(&resources.database, poll.community_id).await?;
            membership::require_manager(&resources.database, &auth.user, &community).await?;
        }

        resources.database.polls().close_poll(poll_id).await?;
        info!(poll_id, user = %auth.user.username, "Poll closed");
        let poll = require_poll(&resources.database, poll_id).await?;
        let results = poll_results(&resources.database, poll, &auth.user).await?;
        Ok((StatusCode::OK, Json(results)).into_response())
    }
}

async fn require_poll(database: &Database, poll_id: i64) -> Result<Poll, AppError> {
    database
        .polls()
        .get_poll(poll_id)
        .await?
        .ok_or_else(|| AppError::not_found("Poll"))
}

async fn poll_results(database: &Database, poll: Poll, viewer: &User) -> Result<PollResults, AppError> {
    let polls = database.polls();
    let options = polls.options_with_counts(poll.id).await?;
    let user_votes = polls.user_votes(poll.id, viewer.id).await?;
    let total_voters = polls.total_voters(poll.id).await?;
    Ok(PollResults {
        poll,
        options,
        user_votes,
        total_voters,
    })
}
