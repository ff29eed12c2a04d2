// ABOUTME: HTTP server assembly: route merging, tower layers, startup tasks and graceful shutdown
// ABOUTME: Builds the axum application from shared ServerResources and serves it until a signal arrives
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

//! # Server
//!
//! [`build_router`] is also used by the integration tests, which drive the
//! returned router directly without binding a socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use http::{header, HeaderValue};
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

use crate::config::{DatabaseUrl, ServerConfig};
use crate::database::Database;
use crate::middleware::{propagate_request_id_layer, request_id_layer, setup_cors, trace_layer};
use crate::resources::ServerResources;
use crate::routes::{
    AdminRoutes, AuthRoutes, CalendarRoutes, CommunityRoutes, CronRoutes, GroupChatRoutes,
    HealthRoutes, MessageRoutes, NotificationRoutes, PollRoutes, PostRoutes, ProfileRoutes,
    UploadRoutes,
};
use crate::services::accounts::bootstrap_admin;
use crate::services::mailer::mailer_from_config;
use crate::services::reminders::spawn_reminder_loop;

/// Requests taking longer than this are answered with 408
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Allowance for multipart framing on top of the upload size limit
const BODY_LIMIT_SLACK_BYTES: usize = 64 * 1024;

/// Build the full application router with every layer applied
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    let config = resources.config.clone();

    let api = Router::new()
        .merge(HealthRoutes::routes(resources.clone()))
        .merge(AuthRoutes::routes(resources.clone()))
        .merge(ProfileRoutes::routes(resources.clone()))
        .merge(CommunityRoutes::routes(resources.clone()))
        .merge(PostRoutes::routes(resources.clone()))
        .merge(PollRoutes::routes(resources.clone()))
        .merge(MessageRoutes::routes(resources.clone()))
        .merge(GroupChatRoutes::routes(resources.clone()))
        .merge(NotificationRoutes::routes(resources.clone()))
        .merge(CalendarRoutes::routes(resources.clone()))
        .merge(UploadRoutes::routes(resources.clone()))
        .merge(AdminRoutes::routes(resources.clone()))
        .merge(CronRoutes::routes(resources));

    api.nest_service("/uploads", ServeDir::new(&config.uploads.directory))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(RequestBodyLimitLayer::new(
            config.uploads.max_bytes.saturating_add(BODY_LIMIT_SLACK_BYTES),
        ))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(propagate_request_id_layer())
        .layer(trace_layer())
        .layer(request_id_layer())
        .layer(setup_cors(&config))
}

/// Create the database directory and the upload directory
///
/// # Errors
///
/// Returns an error if a directory cannot be created
pub async fn prepare_storage(config: &ServerConfig) -> Result<()> {
    if let DatabaseUrl::SQLite { path } = &config.database_url {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }
    }
    tokio::fs::create_dir_all(&config.uploads.directory)
        .await
        .with_context(|| {
            format!(
                "creating upload directory {}",
                config.uploads.directory.display()
            )
        })?;
    Ok(())
}

/// Open storage, run startup tasks and serve until shutdown
///
/// # Errors
///
/// Returns an error if storage, the mailer or the listener cannot be set up
pub async fn run(config: ServerConfig) -> Result<()> {
    prepare_storage(&config).await?;
    let database = Database::new(&config.database_url.to_connection_string()).await?;
    let mailer = mailer_from_config(&config.mail)?;
    let resources = Arc::new(ServerResources::new(database, config, mailer));

    if let Some(admin) = &resources.config.admin_bootstrap {
        match bootstrap_admin(&resources.database, &resources.auth_manager, admin).await {
            Ok(user) => info!(username = %user.username, "Admin account ready"),
            Err(e) => warn!("Admin bootstrap failed: {e}"),
        }
    }

    let reminder_task = match resources.config.reminders.interval_secs {
        0 => None,
        secs => Some(spawn_reminder_loop(
            resources.database.clone(),
            Duration::from_secs(secs),
        )),
    };

    let address: SocketAddr = format!("{}:{}", resources.config.host, resources.config.http_port)
        .parse()
        .with_context(|| format!("invalid listen address {}", resources.config.host))?;
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(%address, "HTTP server listening");

    axum::serve(listener, build_router(resources))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    if let Some(task) = reminder_task {
        task.abort();
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for shutdown signal: {e}");
                }
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {e}");
        }
    }
    info!("Shutdown signal received");
}
