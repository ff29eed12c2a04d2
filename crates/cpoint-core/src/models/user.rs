// ABOUTME: User account models and username derivation rules
// ABOUTME: Stored users, public profiles, pending signups and login history entries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::auth::FALLBACK_USERNAME;

/// A registered user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable account id
    pub id: Uuid,
    /// Unique lowercase handle
    pub username: String,
    /// Unique email, stored lowercase
    pub email: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: Option<String>,
    /// Phone number
    pub mobile: Option<String>,
    /// Free-form bio
    pub bio: Option<String>,
    /// Upload reference of the profile picture
    pub profile_picture: Option<String>,
    /// bcrypt hash
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Deactivated accounts cannot log in
    pub is_active: bool,
    /// Global superuser flag
    pub is_admin: bool,
    /// Email ownership confirmed
    pub email_verified: bool,
    /// Account creation time
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Display name built from first and last name
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.last_name.as_deref().filter(|l| !l.is_empty()) {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }
}

/// Public view of a user, safe to show to other members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Account id
    pub id: Uuid,
    /// Handle
    pub username: String,
    /// Display name
    pub display_name: String,
    /// Bio
    pub bio: Option<String>,
    /// Profile picture reference
    pub profile_picture: Option<String>,
    /// Joined at
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name(),
            bio: user.bio.clone(),
            profile_picture: user.profile_picture.clone(),
            created_at: user.created_at,
        }
    }
}

/// Registration awaiting email verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSignup {
    /// Row id
    pub id: i64,
    /// Reserved username
    pub username: String,
    /// Email to verify
    pub email: String,
    /// Already-hashed password
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: Option<String>,
    /// Phone number
    pub mobile: Option<String>,
    /// Created at
    pub created_at: DateTime<Utc>,
}

/// One recorded login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRecord {
    /// Username that logged in
    pub username: String,
    /// Client address, if known
    pub ip_address: Option<String>,
    /// Client user agent, if known
    pub user_agent: Option<String>,
    /// Login time
    pub login_at: DateTime<Utc>,
}

/// Reduce free text to a valid username: lowercase ASCII letters, digits and `_`
#[must_use]
pub fn sanitize_username(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

/// Username stem derived from the local part of an email address
#[must_use]
pub fn username_stem_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let stem = sanitize_username(local);
    if stem.is_empty() {
        FALLBACK_USERNAME.to_owned()
    } else {
        stem
    }
}

/// Candidate usernames for a stem: `stem`, `stem2`, `stem3`, ...
pub fn username_candidates(stem: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(stem.to_owned()).chain((2_u32..).map(move |n| format!("{stem}{n}")))
}
