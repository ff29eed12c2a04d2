// ABOUTME: Profile route handlers: public profiles, profile edits and onboarding status
// ABOUTME: Profile pictures are stored as normalised upload references
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use cpoint_core::errors::AppError;
use cpoint_core::models::UserProfile;
use serde::{Deserialize, Serialize};

use crate::database::ProfileUpdate;
use crate::resources::ServerResources;
use crate::services::media::{normalize_upload_reference, public_url};
use crate::services::validation::{optional, validate_length};

const MAX_BIO_LEN: usize = 500;
const MAX_NAME_LEN: usize = 100;

/// Editable profile fields; absent fields stay unchanged
#[derive(Debug, Deserialize, Default)]
pub struct UpdateProfileRequest {
    /// Given name
    pub first_name: Option<String>,
    /// Family name
    pub last_name: Option<String>,
    /// Bio
    pub bio: Option<String>,
    /// Phone number
    pub mobile: Option<String>,
    /// Upload reference or absolute URL of the picture
    pub profile_picture: Option<String>,
}

/// Public profile with a resolved picture URL
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    /// Profile fields
    #[serde(flatten)]
    pub profile: UserProfile,
    /// Absolute picture URL
    pub profile_picture_url: Option<String>,
}

/// Whether onboarding should be shown
#[derive(Debug, Serialize, Deserialize)]
pub struct OnboardingStatus {
    /// True when any step is outstanding
    pub should_onboard: bool,
    /// No profile picture yet
    pub missing_profile_picture: bool,
    /// No bio yet
    pub missing_bio: bool,
    /// Communities joined
    pub community_count: usize,
}

/// Profile routes handler
pub struct ProfileRoutes;

impl ProfileRoutes {
    /// Create all profile routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/profile", put(Self::handle_update_profile))
            .route("/api/profile/:username", get(Self::handle_get_profile))
            .route("/api/onboarding/status", get(Self::handle_onboarding_status))
            .with_state(resources)
    }

    /// Handle GET /api/profile/:username
    async fn handle_get_profile(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(username): Path<String>,
    ) -> Result<Response, AppError> {
        resources.authenticate(&headers).await?;
        let user = resources
            .database
            .users()
            .get_user_by_username(&username)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::not_found("User"))?;

        let profile = UserProfile::from(&user);
        let profile_picture_url = profile
            .profile_picture
            .as_deref()
            .map(|reference| public_url(&resources.config.public_base_url, reference));
        Ok((
            StatusCode::OK,
            Json(ProfileResponse {
                profile,
                profile_picture_url,
            }),
        )
            .into_response())
    }

    /// Handle PUT /api/profile
    async fn handle_update_profile(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<UpdateProfileRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;

        let first_name = optional(body.first_name.as_deref());
        if let Some(name) = &first_name {
            validate_length(name, MAX_NAME_LEN, "first_name")?;
        }
        if let Some(bio) = &body.bio {
            validate_length(bio, MAX_BIO_LEN, "bio")?;
        }

        let update = ProfileUpdate {
            first_name,
            last_name: body.last_name.map(|v| v.trim().to_owned()),
            bio: body.bio.map(|v| v.trim().to_owned()),
            mobile: body.mobile.map(|v| v.trim().to_owned()),
            profile_picture: body
                .profile_picture
                .as_deref()
                .and_then(normalize_upload_reference),
        };
        let user = resources
            .database
            .users()
            .update_profile(auth.user.id, &update)
            .await?;
        Ok((StatusCode::OK, Json(user)).into_response())
    }

    /// Handle GET /api/onboarding/status
    async fn handle_onboarding_status(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let community_count = resources
            .database
            .communities()
            .list_user_communities(auth.user.id)
            .await?
            .len();

        let filled = |value: Option<&str>| value.is_some_and(|v| !v.trim().is_empty());
        let missing_profile_picture = !filled(auth.user.profile_picture.as_deref());
        let missing_bio = !filled(auth.user.bio.as_deref());
        let status = OnboardingStatus {
            should_onboard: missing_profile_picture || missing_bio || community_count == 0,
            missing_profile_picture,
            missing_bio,
            community_count,
        };
        Ok((StatusCode::OK, Json(status)).into_response())
    }
}
