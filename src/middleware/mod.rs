// ABOUTME: HTTP middleware for request tracing, authentication and CORS
// ABOUTME: Request ids, per-request spans, session resolution and admin guards
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

/// Superuser guard
pub mod admin_guard;
/// Session and token authentication
pub mod auth;
/// Cross-origin configuration
pub mod cors;
/// Request ids and spans
pub mod tracing;

pub use admin_guard::require_admin;
pub use auth::{AuthMethod, AuthMiddleware, AuthResult};
pub use cors::setup_cors;
pub use self::tracing::{propagate_request_id_layer, request_id_layer, trace_layer};
