// ABOUTME: Community, membership role and invitation models
// ABOUTME: Role parsing plus the viewer-role resolution used by member listings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::auth::{QR_INVITE_EMAIL_DOMAIN, QR_INVITE_EMAIL_PREFIX};
use crate::errors::AppError;

/// Community type that lets parent admins appoint admins in its sub-communities
pub const BUSINESS_COMMUNITY_TYPE: &str = "business";

/// A community
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    /// Row id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Free-form type, e.g. "University", "Business", "gym"
    pub community_type: String,
    /// Description
    pub description: Option<String>,
    /// Current owner
    pub creator_id: Uuid,
    /// Code used to join without an invitation
    pub join_code: String,
    /// Parent community, if nested
    pub parent_community_id: Option<i64>,
    /// Theme background colour
    pub background_color: Option<String>,
    /// Theme text colour
    pub text_color: Option<String>,
    /// Theme accent colour
    pub accent_color: Option<String>,
    /// Optional membership cap
    pub max_members: Option<i64>,
    /// Created at
    pub created_at: DateTime<Utc>,
}

impl Community {
    /// Whether parent admins may appoint admins in this community
    #[must_use]
    pub fn allows_parent_admin_delegation(&self) -> bool {
        self.parent_community_id.is_some()
            && self
                .community_type
                .eq_ignore_ascii_case(BUSINESS_COMMUNITY_TYPE)
    }
}

/// Per-community membership role
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommunityRole {
    /// Owns the community
    Owner,
    /// Administers the community
    Admin,
    /// Regular member
    #[default]
    Member,
}

impl CommunityRole {
    /// Database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Whether this role grants administrative rights
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

impl Display for CommunityRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CommunityRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            _ => Err(AppError::invalid_input("Invalid role specified")),
        }
    }
}

/// Whether a stored role string grants administrative rights.
///
/// Older rows may carry `moderator` or `manager`; both count as admin.
#[must_use]
pub fn is_admin_role(role: &str) -> bool {
    matches!(
        role.to_lowercase().as_str(),
        "owner" | "admin" | "moderator" | "manager"
    )
}

/// How the caller relates to a community, as reported in member listings
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewerRole {
    /// Caller owns the community
    Owner,
    /// Caller is the global superuser
    AppAdmin,
    /// Caller has an admin role in the community
    Admin,
    /// Regular member
    Member,
}

impl ViewerRole {
    /// Resolve the viewer role; ownership wins over superuser, which wins over membership role
    #[must_use]
    pub fn resolve(is_owner: bool, is_app_admin: bool, membership_role: Option<&str>) -> Self {
        if is_owner {
            Self::Owner
        } else if is_app_admin {
            Self::AppAdmin
        } else if membership_role.is_some_and(is_admin_role) {
            Self::Admin
        } else {
            Self::Member
        }
    }
}

/// A community membership row joined with user details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityMember {
    /// Member account id
    pub user_id: Uuid,
    /// Member handle
    pub username: String,
    /// Display name
    pub display_name: String,
    /// Profile picture reference
    pub profile_picture: Option<String>,
    /// Stored role string
    pub role: String,
    /// Whether this member created the community
    pub is_creator: bool,
    /// Joined at
    pub joined_at: DateTime<Utc>,
}

/// Sort key for member listings: creator, then admin roles, then everyone else, then username
#[must_use]
pub fn member_sort_key(member: &CommunityMember) -> (u8, String) {
    let rank = if member.is_creator {
        0
    } else if member.role.eq_ignore_ascii_case("admin") {
        1
    } else if member.role.eq_ignore_ascii_case("owner") {
        2
    } else {
        3
    };
    (rank, member.username.to_lowercase())
}

/// A community the caller belongs to, with the caller's role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipSummary {
    /// Community row
    pub community: Community,
    /// Caller role
    pub role: String,
    /// Joined at
    pub joined_at: DateTime<Utc>,
}

/// Invitation to join a community
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityInvitation {
    /// Row id
    pub id: i64,
    /// Target community
    pub community_id: i64,
    /// Opaque token
    pub token: String,
    /// Invited address, or a QR placeholder
    pub invited_email: String,
    /// Who issued it
    pub invited_by: Uuid,
    /// Explicit parent communities to join, instead of the parent chain
    pub include_parent_ids: Option<Vec<i64>>,
    /// Nested communities to join as well
    pub include_nested_ids: Vec<i64>,
    /// Whether it has been consumed
    pub used: bool,
    /// When it was consumed
    pub used_at: Option<DateTime<Utc>>,
    /// Created at
    pub created_at: DateTime<Utc>,
}

impl CommunityInvitation {
    /// QR invitations are not bound to an email address
    #[must_use]
    pub fn is_qr(&self) -> bool {
        is_qr_invite_email(&self.invited_email)
    }

    /// Whether `email` may redeem this invitation
    #[must_use]
    pub fn accepts_email(&self, email: &str) -> bool {
        self.is_qr() || self.invited_email.eq_ignore_ascii_case(email.trim())
    }
}

/// Placeholder email stored for QR invitations
#[must_use]
pub fn qr_invite_email(token: &str) -> String {
    format!("{QR_INVITE_EMAIL_PREFIX}{token}@{QR_INVITE_EMAIL_DOMAIN}")
}

/// Whether an invitation email is a QR placeholder
#[must_use]
pub fn is_qr_invite_email(email: &str) -> bool {
    let lower = email.to_lowercase();
    lower.starts_with(QR_INVITE_EMAIL_PREFIX)
        && lower.ends_with(&format!("@{QR_INVITE_EMAIL_DOMAIN}"))
}
