// ABOUTME: Account lifecycle: signup with email verification, invitation signups and admin bootstrap
// ABOUTME: Derives free usernames and promotes pending signups into users
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use cpoint_core::errors::{AppError, AppResult};
use cpoint_core::models::{
    sanitize_username, username_candidates, username_stem_from_email, CommunityRole,
    PendingSignup, User,
};
use uuid::Uuid;
use tracing::{info, warn};

use super::membership::{accept_invitation, join_ancestors, validate_invitation};
use super::validation::{is_valid_email, validate_new_password};
use crate::auth::AuthManager;
use crate::config::AdminBootstrap;
use crate::database::{Database, NewUser};

/// Registration form after field extraction
#[derive(Debug, Clone, Default)]
pub struct SignupInput {
    /// Desired username; derived from the email when absent
    pub username: Option<String>,
    /// Email address
    pub email: String,
    /// Password
    pub password: String,
    /// Password confirmation
    pub confirm_password: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: Option<String>,
    /// Phone number
    pub mobile: Option<String>,
    /// Community invitation being redeemed
    pub invite_token: Option<String>,
}

/// Result of a signup request
#[derive(Debug, Clone)]
pub enum SignupOutcome {
    /// A verification email went out; the account exists once it is confirmed
    VerificationRequired(PendingSignup),
    /// An invitation vouched for the email; the account is live
    Registered {
        /// The new account
        user: User,
        /// Community joined through the invitation
        community_id: i64,
    },
}

/// First free username for a stem: `stem`, `stem2`, `stem3`, ...
///
/// # Errors
///
/// Returns an error if a lookup fails
pub async fn available_username(database: &Database, stem: &str) -> AppResult<String> {
    let users = database.users();
    for candidate in username_candidates(stem) {
        if !users.username_exists(&candidate).await? {
            return Ok(candidate);
        }
    }
    Err(AppError::internal("Username candidates exhausted"))
}

/// Validate a signup and either store it pending verification or, with a
/// matching invitation, create the account at once.
///
/// # Errors
///
/// Returns `InvalidInput` for bad fields, `ResourceAlreadyExists` for a taken
/// email or username, and invitation errors when the token cannot be redeemed;
/// in that case no account is left behind
pub async fn signup(
    database: &Database,
    auth: &AuthManager,
    input: SignupInput,
) -> AppResult<SignupOutcome> {
    let email = input.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::invalid_input("Invalid email address"));
    }
    validate_new_password(&input.password, &input.confirm_password)?;

    let users = database.users();
    if users.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::already_exists(
            "An account with this email already exists",
        ));
    }

    let username = match input.username.as_deref().map(sanitize_username) {
        Some(desired) if !desired.is_empty() => {
            if users.username_exists(&desired).await? {
                return Err(AppError::already_exists("Username is already taken"));
            }
            desired
        }
        _ => available_username(database, &username_stem_from_email(&email)).await?,
    };

    let invitation = match input.invite_token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => {
            let invitation = database
                .communities()
                .get_invitation_by_token(token)
                .await?
                .ok_or_else(|| AppError::not_found("Invitation"))?;
            validate_invitation(&invitation, &email)?;
            Some(invitation)
        }
        _ => None,
    };

    let new_user = NewUser {
        username,
        email,
        first_name: input.first_name.trim().to_owned(),
        last_name: input.last_name,
        mobile: input.mobile,
        password_hash: auth.hash_password(&input.password)?,
        email_verified: invitation.is_some(),
        is_admin: false,
    };

    match invitation {
        Some(invitation) => {
            let user = users.create_user(&new_user).await?;
            if let Err(error) = accept_invitation(database, &user, &invitation.token).await {
                // the account only exists to redeem this invitation
                users.delete_user(user.id).await?;
                warn!(email = %user.email, error = %error, "Invitation signup rolled back");
                return Err(error);
            }
            info!(user = %user.username, community_id = invitation.community_id, "Registered through invitation");
            Ok(SignupOutcome::Registered {
                user,
                community_id: invitation.community_id,
            })
        }
        None => {
            let pending = users.upsert_pending_signup(&new_user).await?;
            info!(email = %pending.email, "Signup pending email verification");
            Ok(SignupOutcome::VerificationRequired(pending))
        }
    }
}

/// Promote a pending signup into a verified user.
///
/// The reserved username gets a numeric suffix when someone took it in the
/// meantime.
///
/// # Errors
///
/// Returns `AuthInvalid`/`AuthExpired` for bad tokens, `ResourceNotFound`
/// when the pending signup is gone, or `ResourceAlreadyExists` when the
/// email was registered meanwhile
pub async fn verify_email(database: &Database, auth: &AuthManager, token: &str) -> AppResult<User> {
    let (pending_id, email) = auth.validate_verification_token(token)?;
    let users = database.users();
    let pending = users
        .get_pending_signup(pending_id)
        .await?
        .filter(|p| p.email.eq_ignore_ascii_case(&email))
        .ok_or_else(|| AppError::not_found("Pending signup"))?;

    if users.get_user_by_email(&pending.email).await?.is_some() {
        users.delete_pending_signup(pending.id).await?;
        return Err(AppError::already_exists(
            "An account with this email already exists",
        ));
    }

    let username = available_username(database, &pending.username).await?;
    let user = users
        .create_user(&NewUser {
            username,
            email: pending.email.clone(),
            first_name: pending.first_name.clone(),
            last_name: pending.last_name.clone(),
            mobile: pending.mobile.clone(),
            password_hash: pending.password_hash.clone(),
            email_verified: true,
            is_admin: false,
        })
        .await?;
    users.delete_pending_signup(pending.id).await?;
    info!(user = %user.username, "Email verified");
    Ok(user)
}

/// Delete an account, keeping the shared spaces it created alive.
///
/// Communities the user created pass to `successor` as owner, and group
/// chats pass to their earliest remaining member. The user's own posts,
/// messages and memberships go with the account.
///
/// # Errors
///
/// Returns `ResourceNotFound` for unknown users or a database error
pub async fn delete_account(database: &Database, successor: &User, user_id: Uuid) -> AppResult<User> {
    let users = database.users();
    let target = users
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let communities = database.communities();
    let reassigned = communities.reassign_creator(target.id, successor.id).await?;
    for community_id in &reassigned {
        communities
            .upsert_member_role(successor.id, *community_id, CommunityRole::Owner)
            .await?;
        join_ancestors(database, successor.id, *community_id).await?;
    }
    database.group_chats().release_user(target.id).await?;

    if !users.delete_user(target.id).await? {
        return Err(AppError::not_found("User"));
    }
    info!(
        user = %target.username,
        successor = %successor.username,
        communities = reassigned.len(),
        "Account deleted"
    );
    Ok(target)
}

/// Create or promote the configured superuser
///
/// # Errors
///
/// Returns an error if hashing or a query fails
pub async fn bootstrap_admin(
    database: &Database,
    auth: &AuthManager,
    admin: &AdminBootstrap,
) -> AppResult<User> {
    let users = database.users();
    if let Some(existing) = users.get_user_by_username(&admin.username).await? {
        if !existing.is_admin {
            users.set_admin(existing.id, true).await?;
            info!(user = %existing.username, "Promoted existing user to app admin");
        }
        return users
            .get_user(existing.id)
            .await?
            .ok_or_else(|| AppError::internal("Admin user vanished"));
    }

    let user = users
        .create_user(&NewUser {
            username: sanitize_username(&admin.username),
            email: admin.email.clone(),
            first_name: "Admin".to_owned(),
            last_name: None,
            mobile: None,
            password_hash: auth.hash_password(&admin.password)?,
            email_verified: true,
            is_admin: true,
        })
        .await?;
    info!(user = %user.username, "Created app admin");
    Ok(user)
}
