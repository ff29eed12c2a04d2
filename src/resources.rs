// ABOUTME: Centralized resource container shared by every route group
// ABOUTME: Holds the database, auth manager, auth middleware, configuration and mailer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

//! # Server Resources
//!
//! Built once at startup and handed to each router as axum state, so
//! handlers never construct their own managers or HTTP clients.

use std::sync::Arc;

use cpoint_core::errors::AppResult;
use http::HeaderMap;

use crate::auth::AuthManager;
use crate::config::ServerConfig;
use crate::database::Database;
use crate::middleware::{AuthMiddleware, AuthResult};
use crate::services::mailer::EmailSender;

/// Centralized resource container for dependency injection
#[derive(Clone)]
pub struct ServerResources {
    /// Database pool and managers
    pub database: Arc<Database>,
    /// Token issuing and password hashing
    pub auth_manager: Arc<AuthManager>,
    /// Request authentication
    pub auth_middleware: Arc<AuthMiddleware>,
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Outgoing email
    pub mailer: Arc<dyn EmailSender>,
}

impl ServerResources {
    /// Create new server resources with proper Arc sharing
    #[must_use]
    pub fn new(database: Database, config: ServerConfig, mailer: Arc<dyn EmailSender>) -> Self {
        let database = Arc::new(database);
        let auth_manager = Arc::new(AuthManager::new(&config.auth));
        let auth_middleware = Arc::new(AuthMiddleware::new(
            auth_manager.clone(),
            database.clone(),
        ));
        Self {
            database,
            auth_manager,
            auth_middleware,
            config: Arc::new(config),
            mailer,
        }
    }

    /// Authenticate a request, see [`AuthMiddleware::authenticate_request_with_headers`]
    ///
    /// # Errors
    ///
    /// Returns an authentication error when no valid credential is present
    pub async fn authenticate(&self, headers: &HeaderMap) -> AppResult<AuthResult> {
        self.auth_middleware
            .authenticate_request_with_headers(headers)
            .await
    }

    /// Absolute URL for a front-end path such as `/verify?token=..`
    #[must_use]
    pub fn link(&self, path: &str) -> String {
        format!("{}{path}", self.config.public_base_url)
    }
}
