// ABOUTME: Main library entry point for the C-Point community platform server
// ABOUTME: JSON API for communities, feeds, polls, messaging, notifications and calendar events
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

#![recursion_limit = "256"]
#![deny(unsafe_code)]

//! # C-Point Server
//!
//! A community platform backend: nested communities with roles and
//! invitations, feeds with replies and reactions, polls with reminder
//! milestones, direct and group messaging, in-app notifications and a
//! calendar with RSVPs.
//!
//! ## Architecture
//!
//! - **Config**: environment-driven [`config::ServerConfig`]
//! - **Database**: `SQLite` through sqlx, one manager per domain
//! - **Services**: membership cascades, accounts, media, mail and reminders
//! - **Routes**: thin axum handlers sharing [`resources::ServerResources`]
//!
//! Domain models, errors and the pure hierarchy and reminder rules live in
//! the `cpoint-core` crate.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cpoint_server::config::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     cpoint_server::server::run(config).await
//! }
//! ```

/// Session tokens, password hashing and verification links
pub mod auth;

/// Environment configuration
pub mod config;

/// `SQLite` storage
pub mod database;

/// Structured logging setup
pub mod logging;

/// Authentication, CORS and request tracing middleware
pub mod middleware;

/// Shared state handed to every router
pub mod resources;

/// HTTP route handlers
pub mod routes;

/// Cookie helpers and constant-time comparison
pub mod security;

/// Server assembly and lifecycle
pub mod server;

/// Business logic shared by handlers
pub mod services;
