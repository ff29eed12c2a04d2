// ABOUTME: Community membership rules: joins, leaves, role changes and invitations
// ABOUTME: Cascades walk the community forest so ancestors and descendants stay consistent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

//! Membership business logic shared by the community routes.
//!
//! Joining a community also joins every ancestor as a plain member, leaving
//! or being removed drops the membership in every descendant, and ownership
//! changes demote the previous owner to admin. The walks themselves live in
//! [`cpoint_core::hierarchy`]; this module only applies their results.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use cpoint_core::constants::{auth::APP_ADMIN_USERNAME, limits::JOIN_CODE_LEN, notification_types};
use cpoint_core::errors::{AppError, AppResult};
use cpoint_core::models::{
    is_admin_role, member_sort_key, Community, CommunityInvitation, CommunityMember,
    CommunityRole, NewNotification, User, ViewerRole,
};
use rand::distributions::Uniform;
use rand::{Rng, RngCore};
use tracing::info;
use uuid::Uuid;

use super::notifier::notify;
use crate::database::{Database, NewCommunity};

const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const JOIN_CODE_ATTEMPTS: usize = 20;

/// Caller-supplied fields of a new community
#[derive(Debug, Clone, Default)]
pub struct CommunityDraft {
    /// Display name
    pub name: String,
    /// Free-form type such as `University` or `business`
    pub community_type: String,
    /// Description
    pub description: Option<String>,
    /// Parent community
    pub parent_community_id: Option<i64>,
    /// Theme background colour
    pub background_color: Option<String>,
    /// Theme text colour
    pub text_color: Option<String>,
    /// Theme accent colour
    pub accent_color: Option<String>,
    /// Membership cap
    pub max_members: Option<i64>,
}

/// Random join code such as `K7QX2MPA`
#[must_use]
pub fn random_join_code() -> String {
    let dist = Uniform::from(0..JOIN_CODE_ALPHABET.len());
    rand::thread_rng()
        .sample_iter(dist)
        .take(JOIN_CODE_LEN)
        .map(|i| char::from(JOIN_CODE_ALPHABET[i]))
        .collect()
}

/// Opaque URL-safe invitation token
#[must_use]
pub fn generate_invitation_token() -> String {
    let mut bytes = [0_u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A join code not used by any community
///
/// # Errors
///
/// Returns an error if the lookup fails or no free code is found
pub async fn unique_join_code(database: &Database) -> AppResult<String> {
    let communities = database.communities();
    for _ in 0..JOIN_CODE_ATTEMPTS {
        let code = random_join_code();
        if !communities.join_code_exists(&code).await? {
            return Ok(code);
        }
    }
    Err(AppError::internal("Could not allocate a unique join code"))
}

/// Load a community or fail with 404
///
/// # Errors
///
/// Returns `ResourceNotFound` for unknown ids
pub async fn require_community(database: &Database, community_id: i64) -> AppResult<Community> {
    database
        .communities()
        .get_community(community_id)
        .await?
        .ok_or_else(|| AppError::not_found("Community"))
}

/// Whether the user owns the community, administers it, or is the superuser
///
/// # Errors
///
/// Returns an error if the membership lookup fails
pub async fn can_manage(database: &Database, user: &User, community: &Community) -> AppResult<bool> {
    if user.is_admin || community.creator_id == user.id {
        return Ok(true);
    }
    let role = database
        .communities()
        .get_membership_role(user.id, community.id)
        .await?;
    Ok(role.as_deref().is_some_and(is_admin_role))
}

/// Fail with 403 unless [`can_manage`] holds
///
/// # Errors
///
/// Returns `PermissionDenied` for ordinary members and outsiders
pub async fn require_manager(database: &Database, user: &User, community: &Community) -> AppResult<()> {
    if can_manage(database, user, community).await? {
        Ok(())
    } else {
        Err(AppError::permission_denied(
            "Only community admins can do this",
        ))
    }
}

/// Fail with 403 unless the user is a member or the superuser
///
/// # Errors
///
/// Returns `PermissionDenied` for outsiders
pub async fn require_member(database: &Database, user: &User, community_id: i64) -> AppResult<()> {
    if user.is_admin {
        return Ok(());
    }
    let role = database
        .communities()
        .get_membership_role(user.id, community_id)
        .await?;
    if role.is_some() {
        Ok(())
    } else {
        Err(AppError::permission_denied(
            "You are not a member of this community",
        ))
    }
}

/// How the caller relates to a community
///
/// # Errors
///
/// Returns an error if the membership lookup fails
pub async fn viewer_role(database: &Database, user: &User, community: &Community) -> AppResult<ViewerRole> {
    let role = database
        .communities()
        .get_membership_role(user.id, community.id)
        .await?;
    Ok(ViewerRole::resolve(
        community.creator_id == user.id,
        user.is_admin,
        role.as_deref(),
    ))
}

/// Create a community owned by `creator`.
///
/// Sub-communities require admin rights on the parent. The creator becomes
/// owner and joins every ancestor as a member.
///
/// # Errors
///
/// Returns `ResourceNotFound` for an unknown parent, `PermissionDenied`
/// without rights on it, or a database error
pub async fn create_community(
    database: &Database,
    creator: &User,
    draft: CommunityDraft,
) -> AppResult<Community> {
    if let Some(parent_id) = draft.parent_community_id {
        let parent = require_community(database, parent_id).await?;
        if !can_manage(database, creator, &parent).await? {
            return Err(AppError::permission_denied(
                "Only admins of the parent community can create sub-communities",
            ));
        }
    }

    let join_code = unique_join_code(database).await?;
    let communities = database.communities();
    let community = communities
        .create_community(&NewCommunity {
            name: draft.name,
            community_type: draft.community_type,
            description: draft.description,
            creator_id: creator.id,
            join_code,
            parent_community_id: draft.parent_community_id,
            background_color: draft.background_color,
            text_color: draft.text_color,
            accent_color: draft.accent_color,
            max_members: draft.max_members,
        })
        .await?;

    communities
        .upsert_member_role(creator.id, community.id, CommunityRole::Owner)
        .await?;
    join_ancestors(database, creator.id, community.id).await?;

    info!(
        community_id = community.id,
        user = %creator.username,
        "Community created"
    );
    Ok(community)
}

/// Add `user_id` to every ancestor of `community_id` as a member.
///
/// Existing memberships keep their role. Returns the newly joined ids.
///
/// # Errors
///
/// Returns an error if a query fails
pub async fn join_ancestors(database: &Database, user_id: Uuid, community_id: i64) -> AppResult<Vec<i64>> {
    let communities = database.communities();
    let forest = communities.load_forest().await?;
    let mut joined = Vec::new();
    for ancestor in forest.parent_chain(community_id) {
        if communities
            .add_member(user_id, ancestor, CommunityRole::Member)
            .await?
        {
            joined.push(ancestor);
        }
    }
    Ok(joined)
}

/// Fail when `community` already holds `max_members` members
///
/// # Errors
///
/// Returns `LimitExceeded` when the community is full
pub async fn ensure_capacity(database: &Database, community: &Community) -> AppResult<()> {
    let Some(max) = community.max_members else {
        return Ok(());
    };
    if database.communities().count_members(community.id).await? >= max {
        return Err(AppError::limit_exceeded(format!(
            "{} has reached its member limit",
            community.name
        )));
    }
    Ok(())
}

/// Join a community and its ancestors, honouring the membership cap.
///
/// Returns the newly joined ids; empty when already a member.
///
/// # Errors
///
/// Returns `LimitExceeded` when the community is full, or a database error
pub async fn join_community(database: &Database, user: &User, community: &Community) -> AppResult<Vec<i64>> {
    let communities = database.communities();
    if communities
        .get_membership_role(user.id, community.id)
        .await?
        .is_some()
    {
        return Ok(Vec::new());
    }

    ensure_capacity(database, community).await?;

    communities
        .add_member(user.id, community.id, CommunityRole::Member)
        .await?;
    let mut joined = vec![community.id];
    joined.extend(join_ancestors(database, user.id, community.id).await?);

    notify_owner_of_member(database, user, community).await;
    info!(community_id = community.id, user = %user.username, "Joined community");
    Ok(joined)
}

/// Join by join code
///
/// # Errors
///
/// Returns `ResourceNotFound` for an unknown code, plus the errors of [`join_community`]
pub async fn join_by_code(database: &Database, user: &User, code: &str) -> AppResult<(Community, Vec<i64>)> {
    let community = database
        .communities()
        .get_by_join_code(code)
        .await?
        .ok_or_else(|| AppError::not_found("Community with that join code"))?;
    let joined = join_community(database, user, &community).await?;
    Ok((community, joined))
}

/// Leave a community and all of its descendants
///
/// # Errors
///
/// Returns `InvalidInput` for owners, `ResourceNotFound` when not a member
pub async fn leave_community(database: &Database, user: &User, community: &Community) -> AppResult<u64> {
    let communities = database.communities();
    let role = communities
        .get_membership_role(user.id, community.id)
        .await?
        .ok_or_else(|| AppError::not_found("Membership"))?;
    if community.creator_id == user.id || role.eq_ignore_ascii_case("owner") {
        return Err(AppError::invalid_input(
            "Owners cannot leave their community; transfer ownership first",
        ));
    }

    let forest = communities.load_forest().await?;
    let scope = forest.descendants_deepest_first(community.id);
    let removed = communities.remove_memberships(user.id, &scope).await?;
    info!(community_id = community.id, user = %user.username, removed, "Left community");
    Ok(removed)
}

/// Delete a community and every descendant, deepest first
///
/// # Errors
///
/// Returns `PermissionDenied` unless the caller owns it or is the superuser
pub async fn delete_community(database: &Database, actor: &User, community: &Community) -> AppResult<u64> {
    if !(actor.is_admin || community.creator_id == actor.id) {
        return Err(AppError::permission_denied(
            "Only the owner can delete a community",
        ));
    }
    let communities = database.communities();
    let forest = communities.load_forest().await?;
    let ordered = forest.descendants_deepest_first(community.id);
    let deleted = communities.delete_communities(&ordered).await?;
    info!(community_id = community.id, deleted, "Community deleted");
    Ok(deleted)
}

/// Members visible to the caller, ordered creator first, then admins, then by username
///
/// # Errors
///
/// Returns `PermissionDenied` for outsiders
pub async fn list_members(
    database: &Database,
    viewer: &User,
    community: &Community,
) -> AppResult<(Vec<CommunityMember>, ViewerRole)> {
    require_member(database, viewer, community.id).await?;
    let mut members: Vec<CommunityMember> = database
        .communities()
        .list_members(community.id)
        .await?
        .into_iter()
        .filter(|m| !m.username.eq_ignore_ascii_case(APP_ADMIN_USERNAME))
        .collect();
    members.sort_by_key(member_sort_key);
    let role = viewer_role(database, viewer, community).await?;
    Ok((members, role))
}

fn require_owner_or_superuser(actor: &User, community: &Community) -> AppResult<()> {
    if actor.is_admin || community.creator_id == actor.id {
        Ok(())
    } else {
        Err(AppError::permission_denied(
            "Only the community owner can manage members",
        ))
    }
}

async fn require_user(database: &Database, username: &str) -> AppResult<User> {
    database
        .users()
        .get_user_by_username(username.trim())
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

/// Add a user by username, cascading to ancestors
///
/// # Errors
///
/// Returns `PermissionDenied`, `ResourceNotFound` for unknown users,
/// `InvalidInput` when already a member, or `LimitExceeded` when full
pub async fn add_member(
    database: &Database,
    actor: &User,
    community: &Community,
    username: &str,
) -> AppResult<User> {
    require_owner_or_superuser(actor, community)?;
    let target = require_user(database, username).await?;
    let communities = database.communities();
    if communities
        .get_membership_role(target.id, community.id)
        .await?
        .is_some()
    {
        return Err(AppError::invalid_input(format!(
            "{} is already a member",
            target.username
        )));
    }
    ensure_capacity(database, community).await?;
    communities
        .add_member(target.id, community.id, CommunityRole::Member)
        .await?;
    join_ancestors(database, target.id, community.id).await?;
    Ok(target)
}

/// Remove a user by username from the community and its descendants
///
/// # Errors
///
/// Returns `PermissionDenied`, `ResourceNotFound`, or `InvalidInput` when
/// removing the owner
pub async fn remove_member(
    database: &Database,
    actor: &User,
    community: &Community,
    username: &str,
) -> AppResult<u64> {
    require_owner_or_superuser(actor, community)?;
    let target = require_user(database, username).await?;
    if target.id == community.creator_id {
        return Err(AppError::invalid_input(
            "The community owner cannot be removed",
        ));
    }
    let communities = database.communities();
    if communities
        .get_membership_role(target.id, community.id)
        .await?
        .is_none()
    {
        return Err(AppError::not_found("Membership"));
    }
    let forest = communities.load_forest().await?;
    let scope = forest.descendants_deepest_first(community.id);
    communities.remove_memberships(target.id, &scope).await
}

/// Whether `actor` owns or is an `admin` of the parent of a business sub-community
async fn is_parent_admin(database: &Database, actor: &User, community: &Community) -> AppResult<bool> {
    let Some(parent_id) = community
        .parent_community_id
        .filter(|_| community.allows_parent_admin_delegation())
    else {
        return Ok(false);
    };
    let Some(parent) = database.communities().get_community(parent_id).await? else {
        return Ok(false);
    };
    if parent.creator_id == actor.id {
        return Ok(true);
    }
    let role = database
        .communities()
        .get_membership_role(actor.id, parent_id)
        .await?;
    Ok(role.is_some_and(|r| r.eq_ignore_ascii_case("admin")))
}

/// Change a member's role.
///
/// `owner` transfers ownership (superuser only), enrolling the new owner
/// when they are not yet a member, and demotes the previous owner to admin. `admin` and `member` may be set by the owner, the
/// superuser, or an admin of the parent of a business community; demoting to
/// `member` also demotes the target's ownership in descendants they created.
///
/// # Errors
///
/// Returns `InvalidInput` for unknown roles or owner changes,
/// `PermissionDenied`, or `ResourceNotFound`
pub async fn update_member_role(
    database: &Database,
    actor: &User,
    community: &Community,
    username: &str,
    role: &str,
) -> AppResult<CommunityRole> {
    let new_role: CommunityRole = role.parse()?;
    let target = require_user(database, username).await?;
    let communities = database.communities();

    match new_role {
        CommunityRole::Owner => {
            if !actor.is_admin {
                return Err(AppError::permission_denied(
                    "Only the app admin can transfer ownership",
                ));
            }
            let previous_owner = community.creator_id;
            communities.set_creator(community.id, target.id).await?;
            communities
                .upsert_member_role(target.id, community.id, CommunityRole::Owner)
                .await?;
            join_ancestors(database, target.id, community.id).await?;
            if previous_owner != target.id {
                communities
                    .upsert_member_role(previous_owner, community.id, CommunityRole::Admin)
                    .await?;
            }
        }
        CommunityRole::Admin | CommunityRole::Member => {
            let allowed = actor.is_admin
                || community.creator_id == actor.id
                || is_parent_admin(database, actor, community).await?;
            if !allowed {
                return Err(AppError::permission_denied(
                    "Only the owner can change member roles",
                ));
            }
            if target.id == community.creator_id {
                return Err(AppError::invalid_input("Cannot change the owner's role"));
            }
            if communities
                .get_membership_role(target.id, community.id)
                .await?
                .is_none()
            {
                return Err(AppError::not_found("Membership"));
            }
            communities
                .upsert_member_role(target.id, community.id, new_role)
                .await?;
            if new_role == CommunityRole::Member {
                let forest = communities.load_forest().await?;
                let owned = forest.owned_descendants(community.id, target.id);
                communities.demote_owner_roles(target.id, &owned).await?;
            }
        }
        _ => return Err(AppError::invalid_input("Invalid role specified")),
    }

    notify(
        database,
        NewNotification::new(
            target.id,
            notification_types::ROLE_CHANGE,
            format!("Your role in {} is now {new_role}", community.name),
        )
        .from_user(actor.username.clone())
        .with_community(community.id),
    )
    .await;
    info!(
        community_id = community.id,
        target = %target.username,
        role = %new_role,
        "Member role updated"
    );
    Ok(new_role)
}

/// Redeem an invitation: join its community, parents and nested communities.
///
/// Email invitations are consumed; QR invitations stay reusable.
///
/// # Errors
///
/// Returns `ResourceNotFound` for unknown tokens, `InvalidInput` for used
/// ones, `PermissionDenied` when the email does not match, or
/// `LimitExceeded` when the community is full
pub async fn accept_invitation(
    database: &Database,
    user: &User,
    token: &str,
) -> AppResult<(Community, Vec<i64>)> {
    let communities = database.communities();
    let invitation = communities
        .get_invitation_by_token(token.trim())
        .await?
        .ok_or_else(|| AppError::not_found("Invitation"))?;
    validate_invitation(&invitation, &user.email)?;

    let community = require_community(database, invitation.community_id).await?;
    if communities
        .get_membership_role(user.id, community.id)
        .await?
        .is_none()
    {
        ensure_capacity(database, &community).await?;
    }
    let forest = communities.load_forest().await?;
    let targets = forest.join_set(
        community.id,
        invitation.include_parent_ids.as_deref(),
        &invitation.include_nested_ids,
    );

    let mut joined = Vec::new();
    for community_id in targets {
        if !forest.contains(community_id) {
            continue;
        }
        if communities
            .add_member(user.id, community_id, CommunityRole::Member)
            .await?
        {
            joined.push(community_id);
        }
    }

    if !invitation.is_qr() {
        communities.mark_invitation_used(invitation.id).await?;
    }
    if joined.contains(&community.id) {
        notify_owner_of_member(database, user, &community).await;
    }
    info!(
        community_id = community.id,
        user = %user.username,
        joined = joined.len(),
        "Invitation accepted"
    );
    Ok((community, joined))
}

/// Check an invitation can be redeemed by `email`
///
/// # Errors
///
/// Returns `InvalidInput` for used email invitations or `PermissionDenied`
/// when the address does not match
pub fn validate_invitation(invitation: &CommunityInvitation, email: &str) -> AppResult<()> {
    if invitation.used && !invitation.is_qr() {
        return Err(AppError::invalid_input("Invitation has already been used"));
    }
    if !invitation.accepts_email(email) {
        return Err(AppError::permission_denied(
            "This invitation was sent to a different email address",
        ));
    }
    Ok(())
}

async fn notify_owner_of_member(database: &Database, user: &User, community: &Community) {
    if community.creator_id == user.id {
        return;
    }
    notify(
        database,
        NewNotification::new(
            community.creator_id,
            notification_types::NEW_MEMBER,
            format!("{} joined {}", user.username, community.name),
        )
        .from_user(user.username.clone())
        .with_community(community.id)
        .with_link(format!("/community/{}/members", community.id)),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_code_shape() {
        let code = random_join_code();
        assert_eq!(code.len(), JOIN_CODE_LEN);
        assert!(code.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_invitation_tokens_differ() {
        let a = generate_invitation_token();
        let b = generate_invitation_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
