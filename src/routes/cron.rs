// ABOUTME: Cron-triggered reminder endpoints for polls and calendar events
// ABOUTME: Guarded by the X-API-Key header whenever a cron key is configured
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use cpoint_core::errors::AppError;

use crate::logging::AppLogger;
use crate::resources::ServerResources;
use crate::security::constant_time_eq;
use crate::services::reminders::{run_event_reminders, run_poll_reminders};

/// Header carrying the cron key
pub const CRON_KEY_HEADER: &str = "x-api-key";

/// Reminder cron routes
pub struct CronRoutes;

impl CronRoutes {
    /// Create the cron routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/cron/poll_notification_check",
                post(Self::handle_poll_check),
            )
            .route(
                "/api/cron/event_notification_check",
                post(Self::handle_event_check),
            )
            .with_state(resources)
    }

    /// Handle POST /api/cron/poll_notification_check
    async fn handle_poll_check(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        check_cron_key(&resources, &headers)?;
        let report = run_poll_reminders(&resources.database, Utc::now()).await?;
        Ok((
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "notifications_sent": report.sent,
                "report": report,
            })),
        )
            .into_response())
    }

    /// Handle POST /api/cron/event_notification_check
    async fn handle_event_check(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        check_cron_key(&resources, &headers)?;
        let report = run_event_reminders(&resources.database, Utc::now()).await?;
        Ok((
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "notifications_sent": report.sent,
                "report": report,
            })),
        )
            .into_response())
    }
}

/// Require the configured cron key; open when none is configured
fn check_cron_key(resources: &ServerResources, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = resources.config.reminders.cron_api_key.as_deref() else {
        return Ok(());
    };
    let provided = headers
        .get(CRON_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if constant_time_eq(provided, expected) {
        Ok(())
    } else {
        AppLogger::log_security_event("cron_key_rejected", "Invalid cron API key", None);
        Err(AppError::auth_invalid("Invalid cron API key"))
    }
}
