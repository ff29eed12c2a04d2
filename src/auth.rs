// ABOUTME: Password hashing, session and email-verification tokens, and remember tokens
// ABOUTME: Sessions are HS256 JWTs; remember tokens are random and stored only as SHA-256 hashes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

//! # Authentication
//!
//! `AuthManager` owns the signing keys for two token kinds:
//!
//! - session tokens, carried in the `auth_token` cookie or a Bearer header;
//! - email verification tokens, embedded in the link sent after signup.
//!
//! Both are HS256 `JWT`s distinguished by audience. Remember tokens are opaque
//! random strings; only their SHA-256 hex digest is persisted.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use cpoint_core::constants::auth::{
    REMEMBER_TOKEN_BYTES, SESSION_AUDIENCE, TOKEN_ISSUER, VERIFICATION_AUDIENCE,
    VERIFICATION_TOKEN_HOURS,
};
use cpoint_core::errors::{AppError, AppResult};
use cpoint_core::models::User;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AuthConfig;

/// Purpose claim of verification tokens
const EMAIL_VERIFICATION_PURPOSE: &str = "email_verification";

/// `JWT` validation failure
#[derive(Debug, Clone)]
pub enum JwtValidationError {
    /// Token has expired
    TokenExpired,
    /// Signature, audience or issuer mismatch
    TokenInvalid {
        /// Reason for invalidity
        reason: String,
    },
    /// Not a well-formed `JWT`
    TokenMalformed {
        /// Details about malformation
        details: String,
    },
}

impl fmt::Display for JwtValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenExpired => write!(f, "token has expired"),
            Self::TokenInvalid { reason } => write!(f, "token is invalid: {reason}"),
            Self::TokenMalformed { details } => write!(f, "token is malformed: {details}"),
        }
    }
}

impl std::error::Error for JwtValidationError {}

impl From<JwtValidationError> for AppError {
    fn from(err: JwtValidationError) -> Self {
        match err {
            JwtValidationError::TokenExpired => Self::auth_expired(),
            other => Self::auth_invalid(other.to_string()),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for JwtValidationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                Self::TokenMalformed {
                    details: err.to_string(),
                }
            }
            _ => Self::TokenInvalid {
                reason: err.to_string(),
            },
        }
    }
}

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Username at issue time
    pub username: String,
    /// Issued at
    pub iat: i64,
    /// Expiry
    pub exp: i64,
    /// Audience
    pub aud: String,
    /// Issuer
    pub iss: String,
}

/// Email verification token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationClaims {
    /// Pending signup id
    pub sub: String,
    /// Address being verified
    pub email: String,
    /// Always `email_verification`
    pub purpose: String,
    /// Issued at
    pub iat: i64,
    /// Expiry
    pub exp: i64,
    /// Audience
    pub aud: String,
    /// Issuer
    pub iss: String,
}

/// Freshly generated remember token: the cookie value and its stored digest
#[derive(Debug, Clone)]
pub struct RememberToken {
    /// Value sent to the browser
    pub token: String,
    /// SHA-256 hex digest persisted in the database
    pub hash: String,
    /// Expiry
    pub expires_at: DateTime<Utc>,
}

/// Token and password authority
#[derive(Clone)]
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_expiry_hours: i64,
    bcrypt_cost: u32,
}

impl fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthManager")
            .field("session_expiry_hours", &self.session_expiry_hours)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish_non_exhaustive()
    }
}

impl AuthManager {
    /// Create an authentication manager from configuration
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            session_expiry_hours: config.session_expiry_hours,
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    /// Session lifetime in seconds, used for cookie `Max-Age`
    #[must_use]
    pub const fn session_max_age_secs(&self) -> i64 {
        self.session_expiry_hours * 3600
    }

    // ========================================================================
    // Passwords
    // ========================================================================

    /// Hash a password with bcrypt
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        bcrypt::hash(password, self.bcrypt_cost)
            .map_err(|e| AppError::internal(format!("Failed to hash password: {e}")))
    }

    /// Check a password against a stored bcrypt hash; malformed hashes never match
    #[must_use]
    pub fn verify_password(password: &str, hash: &str) -> bool {
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    // ========================================================================
    // Session tokens
    // ========================================================================

    /// Issue a session token for a user
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails
    pub fn generate_token(&self, user: &User) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.session_expiry_hours)).timestamp(),
            aud: SESSION_AUDIENCE.to_owned(),
            iss: TOKEN_ISSUER.to_owned(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign session token: {e}")))
    }

    /// Validate a session token
    ///
    /// # Errors
    ///
    /// Returns the validation failure
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtValidationError> {
        let validation = Self::validation(SESSION_AUDIENCE);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// Validate a session token and return the user id it names
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid`/`AuthExpired` on a bad token
    pub fn extract_user_id(&self, token: &str) -> AppResult<Uuid> {
        let claims = self.validate_token(token)?;
        Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::auth_invalid("Token subject is not a user id"))
    }

    // ========================================================================
    // Email verification tokens
    // ========================================================================

    /// Issue a 24 hour verification token for a pending signup
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails
    pub fn generate_verification_token(&self, pending_id: i64, email: &str) -> AppResult<String> {
        let now = Utc::now();
        let claims = VerificationClaims {
            sub: pending_id.to_string(),
            email: email.to_owned(),
            purpose: EMAIL_VERIFICATION_PURPOSE.to_owned(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(VERIFICATION_TOKEN_HOURS)).timestamp(),
            aud: VERIFICATION_AUDIENCE.to_owned(),
            iss: TOKEN_ISSUER.to_owned(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign verification token: {e}")))
    }

    /// Validate a verification token and return `(pending_id, email)`
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid`/`AuthExpired` on a bad token
    pub fn validate_verification_token(&self, token: &str) -> AppResult<(i64, String)> {
        let validation = Self::validation(VERIFICATION_AUDIENCE);
        let data = decode::<VerificationClaims>(token, &self.decoding_key, &validation)
            .map_err(JwtValidationError::from)?;
        if data.claims.purpose != EMAIL_VERIFICATION_PURPOSE {
            return Err(AppError::auth_invalid("Token has the wrong purpose"));
        }
        let pending_id = data
            .claims
            .sub
            .parse()
            .map_err(|_| AppError::auth_invalid("Token subject is not a signup id"))?;
        Ok((pending_id, data.claims.email))
    }

    fn validation(audience: &str) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_audience(&[audience]);
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation
    }
}

// ============================================================================
// Remember tokens
// ============================================================================

/// Generate a remember token valid for `days`
#[must_use]
pub fn generate_remember_token(days: i64) -> RememberToken {
    let mut bytes = [0_u8; REMEMBER_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);
    RememberToken {
        hash: hash_remember_token(&token),
        token,
        expires_at: Utc::now() + Duration::days(days),
    }
}

/// SHA-256 hex digest of a remember token
#[must_use]
pub fn hash_remember_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
