// ABOUTME: Request authentication from bearer tokens, session cookies and remember tokens
// ABOUTME: Resolves the calling user and rejects deactivated accounts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use chrono::Utc;
use cpoint_core::constants::auth::{REMEMBER_COOKIE, SESSION_COOKIE};
use cpoint_core::errors::{AppError, AppResult, ErrorCode};
use cpoint_core::models::User;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{hash_remember_token, AuthManager};
use crate::database::Database;
use crate::security::cookies::get_cookie_value;

/// How a request proved its identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// `Authorization: Bearer <jwt>`
    BearerToken,
    /// `auth_token` cookie
    SessionCookie,
    /// `remember_token` cookie restoring an expired session
    RememberToken,
}

impl AuthMethod {
    /// Label recorded in request spans
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BearerToken => "bearer",
            Self::SessionCookie => "session_cookie",
            Self::RememberToken => "remember_token",
        }
    }
}

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct AuthResult {
    /// The calling user, always active
    pub user: User,
    /// Credential that was accepted
    pub auth_method: AuthMethod,
}

/// Authenticates requests against the user store
#[derive(Clone)]
pub struct AuthMiddleware {
    auth_manager: Arc<AuthManager>,
    database: Arc<Database>,
}

impl AuthMiddleware {
    /// Create the middleware
    #[must_use]
    pub const fn new(auth_manager: Arc<AuthManager>, database: Arc<Database>) -> Self {
        Self {
            auth_manager,
            database,
        }
    }

    /// Authenticate a request from its headers.
    ///
    /// The bearer header wins when present. Otherwise the session cookie is
    /// tried, and a valid remember token restores the session when the cookie
    /// is missing or no longer valid.
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` without credentials, `AuthInvalid`/`AuthExpired`
    /// for rejected ones and `AccountDisabled` for deactivated accounts
    #[tracing::instrument(
        skip(self, headers),
        fields(
            auth_method = tracing::field::Empty,
            user_id = tracing::field::Empty,
            success = tracing::field::Empty,
        )
    )]
    pub async fn authenticate_request_with_headers(
        &self,
        headers: &HeaderMap,
    ) -> AppResult<AuthResult> {
        let span = tracing::Span::current();
        let result = self.resolve(headers).await;
        match &result {
            Ok(auth) => {
                span.record("auth_method", auth.auth_method.as_str())
                    .record("user_id", auth.user.id.to_string())
                    .record("success", true);
            }
            Err(e) => {
                span.record("success", false);
                debug!("Authentication failed: {e}");
            }
        }
        result
    }

    async fn resolve(&self, headers: &HeaderMap) -> AppResult<AuthResult> {
        if let Some(token) = bearer_token(headers) {
            let user_id = self.auth_manager.extract_user_id(&token)?;
            return self.load_active(user_id, AuthMethod::BearerToken).await;
        }

        let session_error = match get_cookie_value(headers, SESSION_COOKIE) {
            Some(token) => match self.auth_manager.extract_user_id(&token) {
                Ok(user_id) => return self.load_active(user_id, AuthMethod::SessionCookie).await,
                Err(e) => Some(e),
            },
            None => None,
        };

        if let Some(token) = get_cookie_value(headers, REMEMBER_COOKIE) {
            let hash = hash_remember_token(&token);
            if let Some(user_id) = self
                .database
                .users()
                .find_remember_token_user(&hash, Utc::now())
                .await?
            {
                return self.load_active(user_id, AuthMethod::RememberToken).await;
            }
            warn!("Rejected unknown or expired remember token");
        }

        Err(session_error.unwrap_or_else(AppError::auth_required))
    }

    async fn load_active(&self, user_id: Uuid, auth_method: AuthMethod) -> AppResult<AuthResult> {
        let user = self
            .database
            .users()
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::auth_invalid("Account no longer exists"))?;

        if !user.is_active {
            return Err(AppError::new(
                ErrorCode::AccountDisabled,
                "Account has been deactivated",
            ));
        }

        Ok(AuthResult { user, auth_method })
    }
}

/// Token from an `Authorization: Bearer` header
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));
    }
}
