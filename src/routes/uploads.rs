// ABOUTME: File upload route handler storing media under the upload directory
// ABOUTME: Accepts one multipart `file` field and returns the stored upload reference
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use cpoint_core::errors::AppError;
use serde::{Deserialize, Serialize};

use crate::resources::ServerResources;
use crate::services::media::{public_url, save_upload};

/// Target folder of an upload
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// One of the allowed subfolders, `posts` by default
    pub subfolder: Option<String>,
}

/// Stored upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Reference to store on posts, messages and profiles
    pub path: String,
    /// Absolute URL of the file
    pub url: String,
}

/// Upload routes
pub struct UploadRoutes;

impl UploadRoutes {
    /// Create the upload route with a body limit from the config
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        let max_bytes = resources.config.uploads.max_bytes;
        Router::new()
            .route("/api/uploads", post(Self::handle_upload))
            .layer(DefaultBodyLimit::max(max_bytes))
            .with_state(resources)
    }

    /// Handle POST /api/uploads
    async fn handle_upload(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<UploadQuery>,
        mut multipart: Multipart,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let subfolder = query.subfolder.as_deref().unwrap_or("posts");

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::invalid_input(format!("Malformed upload: {e}")))?
        {
            if field.name() != Some("file") {
                continue;
            }
            let file_name = field
                .file_name()
                .map(str::to_owned)
                .ok_or_else(|| AppError::missing_field("file"))?;
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::invalid_input(format!("Failed to read upload: {e}")))?;
            if bytes.is_empty() {
                return Err(AppError::invalid_input("Uploaded file is empty"));
            }

            let path = save_upload(
                &resources.config.uploads.directory,
                subfolder,
                &file_name,
                &bytes,
            )
            .await?;
            tracing::debug!(user = %auth.user.username, %path, "Upload accepted");
            let url = public_url(&resources.config.public_base_url, &path);
            return Ok((StatusCode::CREATED, Json(UploadResponse { path, url })).into_response());
        }
        Err(AppError::missing_field("file"))
    }
}
