// ABOUTME: Authentication route handlers: signup, email verification, login and logout
// ABOUTME: Issues session cookies and remember tokens and exposes the current account
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

//! Authentication routes
//!
//! Sessions are JWTs carried in the `auth_token` cookie (or a bearer header).
//! Logins also issue a 30-day remember token whose SHA-256 hash is stored so
//! the session can be restored after the JWT expires.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use cpoint_core::constants::auth::{REMEMBER_COOKIE, REMEMBER_TOKEN_DAYS};
use cpoint_core::errors::{AppError, AppResult, ErrorCode};
use cpoint_core::models::{LoginRecord, User};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{generate_remember_token, hash_remember_token, AuthManager};
use crate::logging::AppLogger;
use crate::resources::ServerResources;
use crate::security::cookies::{
    clear_auth_cookies, get_cookie_value, set_auth_cookie, set_remember_cookie,
};
use crate::services::accounts::{self, SignupInput, SignupOutcome};
use crate::services::mailer::{send_best_effort, verification_email};
use crate::services::membership;
use crate::services::validation::{optional, required, validate_new_password};

const LOGIN_HISTORY_LIMIT: i64 = 20;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Signup form
#[derive(Debug, Deserialize, Default)]
pub struct SignupRequest {
    /// Desired username
    pub username: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Password confirmation
    pub confirm_password: Option<String>,
    /// Given name
    pub first_name: Option<String>,
    /// Family name
    pub last_name: Option<String>,
    /// Phone number
    pub mobile: Option<String>,
    /// Community invitation token
    pub invite_token: Option<String>,
}

/// Signup result when verification is pending
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    /// Always true
    pub success: bool,
    /// Whether the caller must confirm the email before logging in
    pub verification_required: bool,
    /// Address the verification link was sent to
    pub email: String,
    /// Human readable status
    pub message: String,
}

/// Email verification token
#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    /// Signed verification token
    pub token: String,
}

/// Login form
#[derive(Debug, Deserialize, Default)]
pub struct LoginRequest {
    /// Username or email
    pub username: Option<String>,
    /// Email, accepted in place of `username`
    pub email: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Issue a remember token; defaults to true
    pub remember: Option<bool>,
    /// Community invitation to redeem after login
    pub invite_token: Option<String>,
}

/// Successful login
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Always true
    pub success: bool,
    /// Session JWT, also set as the `auth_token` cookie
    pub token: String,
    /// Seconds until the session expires
    pub expires_in: i64,
    /// The account
    pub user: User,
    /// Community joined through an invitation, if any
    pub joined_community_id: Option<i64>,
}

/// Password change form
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    /// Current password
    pub current_password: String,
    /// New password
    pub new_password: String,
    /// New password confirmation
    pub confirm_password: String,
}

/// Recent logins of the caller
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginHistoryResponse {
    /// Most recent first
    pub logins: Vec<LoginRecord>,
}

// ============================================================================
// Routes
// ============================================================================

/// Authentication routes handler
pub struct AuthRoutes;

impl AuthRoutes {
    /// Create all authentication routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/auth/signup", post(Self::handle_signup))
            .route(
                "/api/auth/verify-email",
                get(Self::handle_verify_email_link).post(Self::handle_verify_email),
            )
            .route("/api/auth/login", post(Self::handle_login))
            .route("/api/auth/logout", post(Self::handle_logout))
            .route("/api/auth/me", get(Self::handle_me))
            .route("/api/auth/change-password", post(Self::handle_change_password))
            .route("/api/auth/login-history", get(Self::handle_login_history))
            .with_state(resources)
    }

    /// Handle POST /api/auth/signup
    async fn handle_signup(
        State(resources): State<Arc<ServerResources>>,
        Json(body): Json<SignupRequest>,
    ) -> Result<Response, AppError> {
        let input = SignupInput {
            username: optional(body.username.as_deref()),
            email: required(body.email.as_deref(), "email")?.to_owned(),
            password: required(body.password.as_deref(), "password")?.to_owned(),
            confirm_password: required(body.confirm_password.as_deref(), "confirm_password")?
                .to_owned(),
            first_name: required(body.first_name.as_deref(), "first_name")?.to_owned(),
            last_name: optional(body.last_name.as_deref()),
            mobile: optional(body.mobile.as_deref()),
            invite_token: optional(body.invite_token.as_deref()),
        };

        match accounts::signup(&resources.database, &resources.auth_manager, input).await? {
            SignupOutcome::VerificationRequired(pending) => {
                let token = resources
                    .auth_manager
                    .generate_verification_token(pending.id, &pending.email)?;
                let link = resources.link(&format!(
                    "/verify-email?token={}",
                    urlencoding::encode(&token)
                ));
                let email = verification_email(&pending.email, &pending.first_name, &link);
                send_best_effort(resources.mailer.as_ref(), &email).await;

                let response = SignupResponse {
                    success: true,
                    verification_required: true,
                    email: pending.email,
                    message: "Check your inbox to verify your email address".to_owned(),
                };
                Ok((StatusCode::CREATED, Json(response)).into_response())
            }
            SignupOutcome::Registered { user, community_id } => {
                Self::session_response(
                    &resources,
                    &user,
                    true,
                    Some(community_id),
                    StatusCode::CREATED,
                )
                .await
            }
        }
    }

    /// Handle GET /api/auth/verify-email?token=
    async fn handle_verify_email_link(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<VerifyEmailRequest>,
    ) -> Result<Response, AppError> {
        Self::verify(&resources, &query.token).await
    }

    /// Handle POST /api/auth/verify-email
    async fn handle_verify_email(
        State(resources): State<Arc<ServerResources>>,
        Json(body): Json<VerifyEmailRequest>,
    ) -> Result<Response, AppError> {
        Self::verify(&resources, &body.token).await
    }

    async fn verify(resources: &Arc<ServerResources>, token: &str) -> Result<Response, AppError> {
        let user =
            accounts::verify_email(&resources.database, &resources.auth_manager, token).await?;
        Self::session_response(resources, &user, true, None, StatusCode::OK).await
    }

    /// Handle POST /api/auth/login
    async fn handle_login(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<LoginRequest>,
    ) -> Result<Response, AppError> {
        let identifier = body
            .username
            .as_deref()
            .or(body.email.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::missing_field("username"))?;
        let password = required(body.password.as_deref(), "password")?;

        let users = resources.database.users();
        let user = users
            .get_user_by_login(identifier)
            .await?
            .filter(|user| AuthManager::verify_password(password, &user.password_hash))
            .ok_or_else(|| {
                AppLogger::log_auth_event(identifier, "login", false, Some("invalid credentials"));
                AppError::auth_invalid("Invalid username or password")
            })?;
        if !user.is_active {
            AppLogger::log_auth_event(&user.username, "login", false, Some("account disabled"));
            return Err(AppError::new(
                ErrorCode::AccountDisabled,
                "This account has been deactivated",
            ));
        }

        users
            .record_login(
                user.id,
                client_ip(&headers).as_deref(),
                headers
                    .get(header::USER_AGENT)
                    .and_then(|v| v.to_str().ok()),
            )
            .await?;

        let joined = match optional(body.invite_token.as_deref()) {
            Some(token) => {
                match membership::accept_invitation(&resources.database, &user, &token).await {
                    Ok((community, _)) => Some(community.id),
                    Err(e) => {
                        warn!(user = %user.username, "Invitation not redeemed at login: {e}");
                        None
                    }
                }
            }
            None => None,
        };

        AppLogger::log_auth_event(&user.username, "login", true, None);
        Self::session_response(
            &resources,
            &user,
            body.remember.unwrap_or(true),
            joined,
            StatusCode::OK,
        )
        .await
    }

    /// Handle POST /api/auth/logout
    async fn handle_logout(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        if let Some(token) = get_cookie_value(&headers, REMEMBER_COOKIE) {
            resources
                .database
                .users()
                .delete_remember_token(&hash_remember_token(&token))
                .await?;
        }

        let mut response = (
            StatusCode::OK,
            Json(serde_json::json!({ "success": true })),
        )
            .into_response();
        clear_auth_cookies(response.headers_mut(), resources.config.auth.cookie_secure);
        Ok(response)
    }

    /// Handle GET /api/auth/me
    async fn handle_me(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        Ok((StatusCode::OK, Json(auth.user)).into_response())
    }

    /// Handle POST /api/auth/change-password
    async fn handle_change_password(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<ChangePasswordRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        if !AuthManager::verify_password(&body.current_password, &auth.user.password_hash) {
            return Err(AppError::auth_invalid("Current password is incorrect"));
        }
        validate_new_password(&body.new_password, &body.confirm_password)?;

        let hash = resources.auth_manager.hash_password(&body.new_password)?;
        let users = resources.database.users();
        users.update_password(auth.user.id, &hash).await?;
        let revoked = users.delete_user_remember_tokens(auth.user.id).await?;
        info!(user = %auth.user.username, revoked, "Password changed");

        Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "message": "Password updated" })),
        )
            .into_response())
    }

    /// Handle GET /api/auth/login-history
    async fn handle_login_history(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let logins = resources
            .database
            .users()
            .recent_logins(auth.user.id, LOGIN_HISTORY_LIMIT)
            .await?;
        Ok((StatusCode::OK, Json(LoginHistoryResponse { logins })).into_response())
    }

    /// Build a login response with session (and optionally remember) cookies
    async fn session_response(
        resources: &ServerResources,
        user: &User,
        remember: bool,
        joined_community_id: Option<i64>,
        status: StatusCode,
    ) -> AppResult<Response> {
        let token = resources.auth_manager.generate_token(user)?;
        let max_age = resources.auth_manager.session_max_age_secs();
        let secure = resources.config.auth.cookie_secure;

        let remember_token = if remember {
            let remember_token = generate_remember_token(REMEMBER_TOKEN_DAYS);
            let users = resources.database.users();
            users.delete_expired_remember_tokens(Utc::now()).await?;
            users
                .store_remember_token(user.id, &remember_token.hash, remember_token.expires_at)
                .await?;
            Some(remember_token)
        } else {
            None
        };

        let body = LoginResponse {
            success: true,
            token: token.clone(),
            expires_in: max_age,
            user: user.clone(),
            joined_community_id,
        };
        let mut response = (status, Json(body)).into_response();
        set_auth_cookie(response.headers_mut(), &token, max_age, secure);
        if let Some(remember_token) = remember_token {
            set_remember_cookie(
                response.headers_mut(),
                &remember_token.token,
                Duration::days(REMEMBER_TOKEN_DAYS).num_seconds(),
                secure,
            );
        }
        Ok(response)
    }
}

/// Client address from proxy headers
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
