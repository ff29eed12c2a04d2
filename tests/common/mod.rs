// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides an in-memory server, a capturing mailer and user creation helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
//! Shared test utilities for `cpoint_server`
//!
//! Every test gets its own in-memory database and upload directory, so tests
//! can run in parallel without stepping on each other.

use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use axum::Router;
use cpoint_core::errors::AppResult;
use cpoint_core::models::User;
use cpoint_server::{
    config::ServerConfig,
    database::{Database, NewUser},
    resources::ServerResources,
    server::build_router,
    services::mailer::{EmailSender, OutgoingEmail},
};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::helpers::axum_test::AxumTestRequest;

/// Password given to every user created through [`TestContext::create_user`]
pub const TEST_PASSWORD: &str = "password123";

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Mailer that records every email instead of delivering it
#[derive(Default)]
pub struct CapturingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl CapturingMailer {
    /// Emails sent so far
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// Most recent email to an address
    pub fn last_to(&self, to: &str) -> Option<OutgoingEmail> {
        self.sent().into_iter().rev().find(|email| email.to == to)
    }
}

#[async_trait]
impl EmailSender for CapturingMailer {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// An in-memory server and the handles tests need to inspect it
pub struct TestContext {
    pub resources: Arc<ServerResources>,
    pub mailer: Arc<CapturingMailer>,
    _uploads: TempDir,
}

impl TestContext {
    /// Fresh database, upload directory and router state
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Like [`TestContext::new`] with a tweak to the test configuration
    pub async fn with_config(configure: impl FnOnce(&mut ServerConfig)) -> Self {
        init_test_logging();
        let uploads = TempDir::new().expect("create upload dir");
        let mut config = ServerConfig::for_testing(uploads.path().to_path_buf());
        configure(&mut config);

        let database = Database::new("sqlite::memory:")
            .await
            .expect("open in-memory database");
        let mailer = Arc::new(CapturingMailer::default());
        let resources = Arc::new(ServerResources::new(
            database,
            config,
            mailer.clone() as Arc<dyn EmailSender>,
        ));

        Self {
            resources,
            mailer,
            _uploads: uploads,
        }
    }

    /// Full application router
    pub fn app(&self) -> Router {
        build_router(self.resources.clone())
    }

    pub fn database(&self) -> &Database {
        &self.resources.database
    }

    /// Create a verified user directly in the database and mint a session token
    pub async fn create_user(&self, username: &str) -> (User, String) {
        self.insert_user(username, false).await
    }

    /// Create a verified platform admin
    pub async fn create_admin(&self, username: &str) -> (User, String) {
        self.insert_user(username, true).await
    }

    async fn insert_user(&self, username: &str, is_admin: bool) -> (User, String) {
        let password_hash = self
            .resources
            .auth_manager
            .hash_password(TEST_PASSWORD)
            .expect("hash password");
        let user = self
            .database()
            .users()
            .create_user(&NewUser {
                username: username.to_owned(),
                email: format!("{username}@example.com"),
                first_name: capitalize(username),
                last_name: None,
                mobile: None,
                password_hash,
                email_verified: true,
                is_admin,
            })
            .await
            .expect("create user");
        let token = self
            .resources
            .auth_manager
            .generate_token(&user)
            .expect("generate token");
        (user, token)
    }

    /// Create a community through the API and return its JSON
    pub async fn create_community(&self, token: &str, body: Value) -> Value {
        AxumTestRequest::post("/api/communities")
            .bearer(token)
            .json(&body)
            .send(self.app())
            .await
            .assert_status(axum::http::StatusCode::CREATED)
            .json()
    }

    /// Create a top-level community named `name`
    pub async fn simple_community(&self, token: &str, name: &str) -> Value {
        self.create_community(token, json!({ "name": name, "type": "General" }))
            .await
    }

    /// Join a community by its code
    pub async fn join(&self, token: &str, join_code: &str) -> Value {
        AxumTestRequest::post("/api/communities/join")
            .bearer(token)
            .json(&json!({ "join_code": join_code }))
            .send(self.app())
            .await
            .assert_status(axum::http::StatusCode::OK)
            .json()
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
