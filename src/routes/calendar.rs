// ABOUTME: Calendar route handlers for events, invitations and RSVPs
// ABOUTME: Community events require membership; invitees are notified in-app
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use cpoint_core::constants::{limits::MAX_POST_LEN, notification_types};
use cpoint_core::errors::AppError;
use cpoint_core::models::{
    CalendarEvent, EventDetails, NewNotification, ReminderPreference, RsvpStatus, User,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::database::{parse_event_date, parse_event_time, Database, EventUpdate, NewEvent};
use crate::resources::ServerResources;
use crate::services::membership;
use crate::services::notifier::notify_all;
use crate::services::validation::{optional, required, validate_length};

// ============================================================================
// Request / Response Types
// ============================================================================

/// Who to invite to an event
#[derive(Debug, Deserialize, Default)]
pub struct InviteRequest {
    /// Explicit usernames
    #[serde(default)]
    pub usernames: Vec<String>,
    /// Invite every member of the event's community
    #[serde(default)]
    pub all_members: bool,
}

/// New event form
#[derive(Debug, Deserialize, Default)]
pub struct CreateEventRequest {
    /// Title
    pub title: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Location
    pub location: Option<String>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    /// `YYYY-MM-DD`
    pub end_date: Option<String>,
    /// `HH:MM`
    pub start_time: Option<String>,
    /// `HH:MM`
    pub end_time: Option<String>,
    /// Owning community
    pub community_id: Option<i64>,
    /// `1_week`, `1_day`, `1_hour`, `all` or `none`
    pub notification_preferences: Option<String>,
    /// Initial invitations
    #[serde(flatten)]
    pub invite: InviteRequest,
}

/// Event edit form; absent fields stay unchanged
#[derive(Debug, Deserialize, Default)]
pub struct UpdateEventRequest {
    /// Title
    pub title: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Location
    pub location: Option<String>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    /// `YYYY-MM-DD`
    pub end_date: Option<String>,
    /// `HH:MM`
    pub start_time: Option<String>,
    /// `HH:MM`
    pub end_time: Option<String>,
    /// Reminder preference
    pub notification_preferences: Option<String>,
}

/// Listing filter
#[derive(Debug, Deserialize, Default)]
pub struct EventListQuery {
    /// Community events instead of the caller's own
    pub community_id: Option<i64>,
    /// First date, inclusive
    pub from: Option<String>,
    /// Last date, inclusive
    pub to: Option<String>,
}

/// RSVP form
#[derive(Debug, Deserialize)]
pub struct RsvpRequest {
    /// `going`, `maybe` or `not_going`
    pub status: String,
}

/// Event listing
#[derive(Debug, Serialize, Deserialize)]
pub struct EventListResponse {
    /// Ordered by date and start time
    pub events: Vec<CalendarEvent>,
}

// ============================================================================
// Routes
// ============================================================================

/// Calendar routes
pub struct CalendarRoutes;

impl CalendarRoutes {
    /// Create all calendar routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/events", get(Self::handle_list).post(Self::handle_create))
            .route(
                "/api/events/:id",
                get(Self::handle_get)
                    .put(Self::handle_update)
                    .delete(Self::handle_delete),
            )
            .route("/api/events/:id/rsvp", post(Self::handle_rsvp))
            .route("/api/events/:id/invite", post(Self::handle_invite))
            .with_state(resources)
    }

    /// Handle POST /api/events
    async fn handle_create(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(body): Json<CreateEventRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let title = required(body.title.as_deref(), "title")?;
        validate_length(title, MAX_POST_LEN, "title")?;
        let date = parse_event_date(required(body.date.as_deref(), "date")?)?;
        if let Some(community_id) = body.community_id {
            membership::require_community(&resources.database, community_id).await?;
            membership::require_member(&resources.database, &auth.user, community_id).await?;
        }

        let new = NewEvent {
            creator_id: auth.user.id,
            community_id: body.community_id,
            title: title.to_owned(),
            description: optional(body.description.as_deref()),
            location: optional(body.location.as_deref()),
            date,
            end_date: parse_optional_date(body.end_date.as_deref())?,
            start_time: parse_optional_time(body.start_time.as_deref())?,
            end_time: parse_optional_time(body.end_time.as_deref())?,
            notification_preferences: body
                .notification_preferences
                .as_deref()
                .map_or(ReminderPreference::All, ReminderPreference::from_str_or_default),
        };
        check_range(&new.date, new.end_date.as_ref())?;
        let invitees =
            resolve_invitees(&resources.database, &auth.user, new.community_id, &body.invite)
                .await?;

        let event = resources.database.calendar().create_event(&new).await?;
        info!(event_id = event.id, community_id = ?event.community_id, "Event created");
        invite_and_notify(&resources.database, &auth.user, &event, &invitees).await?;

        let details = event_details(&resources.database, event, &auth.user).await?;
        Ok((StatusCode::CREATED, Json(details)).into_response())
    }

    /// Handle GET /api/events
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<EventListQuery>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let from = parse_optional_date(query.from.as_deref())?;
        let to = parse_optional_date(query.to.as_deref())?;

        let calendar = resources.database.calendar();
        let events = if let Some(community_id) = query.community_id {
            membership::require_community(&resources.database, community_id).await?;
            membership::require_member(&resources.database, &auth.user, community_id).await?;
            calendar.list_for_community(community_id, from, to).await?
        } else {
            calendar.list_for_user(auth.user.id, from, to).await?
        };
        Ok((StatusCode::OK, Json(EventListResponse { events })).into_response())
    }

    /// Handle GET /api/events/:id
    async fn handle_get(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(event_id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let event = require_event(&resources.database, event_id).await?;
        if !can_participate(&resources.database, &auth.user, &event).await? {
            return Err(AppError::permission_denied("You are not invited to this event"));
        }
        let details = event_details(&resources.database, event, &auth.user).await?;
        Ok((StatusCode::OK, Json(details)).into_response())
    }

    /// Handle PUT /api/events/:id
    async fn handle_update(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(event_id): Path<i64>,
        Json(body): Json<UpdateEventRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let event = require_event(&resources.database, event_id).await?;
        require_organizer(&resources.database, &auth.user, &event).await?;

        let title = optional(body.title.as_deref());
        if let Some(title) = &title {
            validate_length(title, MAX_POST_LEN, "title")?;
        }
        let update = EventUpdate {
            title,
            description: body.description.map(|d| d.trim().to_owned()),
            location: body.location.map(|l| l.trim().to_owned()),
            date: parse_optional_date(body.date.as_deref())?,
            end_date: parse_optional_date(body.end_date.as_deref())?,
            start_time: parse_optional_time(body.start_time.as_deref())?,
            end_time: parse_optional_time(body.end_time.as_deref())?,
            notification_preferences: body
                .notification_preferences
                .as_deref()
                .map(ReminderPreference::from_str_or_default),
        };
        check_range(
            update.date.as_ref().unwrap_or(&event.date),
            update.end_date.as_ref().or(event.end_date.as_ref()),
        )?;

        let updated = resources
            .database
            .calendar()
            .update_event(event_id, &update)
            .await?;
        let details = event_details(&resources.database, updated, &auth.user).await?;
        Ok((StatusCode::OK, Json(details)).into_response())
    }

    /// Handle DELETE /api/events/:id
    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(event_id): Path<i64>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let event = require_event(&resources.database, event_id).await?;
        require_organizer(&resources.database, &auth.user, &event).await?;

        resources.database.calendar().delete_event(event_id).await?;
        info!(event_id, user = %auth.user.username, "Event deleted");
        Ok((StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response())
    }

    /// Handle POST /api/events/:id/rsvp
    async fn handle_rsvp(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(event_id): Path<i64>,
        Json(body): Json<RsvpRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let event = require_event(&resources.database, event_id).await?;
        let status: RsvpStatus = body.status.trim().parse()?;
        if !can_participate(&resources.database, &auth.user, &event).await? {
            return Err(AppError::permission_denied("You are not invited to this event"));
        }

        resources
            .database
            .calendar()
            .set_rsvp(event_id, auth.user.id, status)
            .await?;
        let details = event_details(&resources.database, event, &auth.user).await?;
        Ok((StatusCode::OK, Json(details)).into_response())
    }

    /// Handle POST /api/events/:id/invite
    async fn handle_invite(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(event_id): Path<i64>,
        Json(body): Json<InviteRequest>,
    ) -> Result<Response, AppError> {
        let auth = resources.authenticate(&headers).await?;
        let event = require_event(&resources.database, event_id).await?;
        require_organizer(&resources.database, &auth.user, &event).await?;
        if body.usernames.is_empty() && !body.all_members {
            return Err(AppError::missing_field("usernames"));
        }

        let invitees =
            resolve_invitees(&resources.database, &auth.user, event.community_id, &body).await?;
        let invited = invite_and_notify(&resources.database, &auth.user, &event, &invitees).await?;
        Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "invited": invited })),
        )
            .into_response())
    }
}

fn parse_optional_date(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    optional(raw).as_deref().map(parse_event_date).transpose()
}

fn parse_optional_time(raw: Option<&str>) -> Result<Option<NaiveTime>, AppError> {
    optional(raw).as_deref().map(parse_event_time).transpose()
}

fn check_range(date: &NaiveDate, end_date: Option<&NaiveDate>) -> Result<(), AppError> {
    match end_date {
        Some(end) if end < date => Err(AppError::invalid_input(
            "end_date cannot be before date",
        )),
        _ => Ok(()),
    }
}

async fn require_event(database: &Database, event_id: i64) -> Result<CalendarEvent, AppError> {
    database
        .calendar()
        .get_event(event_id)
        .await?
        .ok_or_else(|| AppError::not_found("Event"))
}

/// Creator, invitee, member of the event's community, or the superuser
async fn can_participate(
    database: &Database,
    user: &User,
    event: &CalendarEvent,
) -> Result<bool, AppError> {
    if user.is_admin || event.creator_id == user.id {
        return Ok(true);
    }
    if database.calendar().is_invited(event.id, user.id).await? {
        return Ok(true);
    }
    match event.community_id {
        Some(community_id) => Ok(database
            .communities()
            .get_membership_role(user.id, community_id)
            .await?
            .is_some()),
        None => Ok(false),
    }
}

/// Creator, admin of the event's community, or the superuser
async fn require_organizer(
    database: &Database,
    user: &User,
    event: &CalendarEvent,
) -> Result<(), AppError> {
    if user.is_admin || event.creator_id == user.id {
        return Ok(());
    }
    if let Some(community_id) = event.community_id {
        let community = membership::require_community(database, community_id).await?;
        if membership::can_manage(database, user, &community).await? {
            return Ok(());
        }
    }
    Err(AppError::permission_denied(
        "Only the organizer can change this event",
    ))
}

/// Account ids named by an invite request, excluding the inviter
async fn resolve_invitees(
    database: &Database,
    inviter: &User,
    community_id: Option<i64>,
    request: &InviteRequest,
) -> Result<Vec<Uuid>, AppError> {
    let mut ids: Vec<Uuid> = Vec::new();
    if request.all_members {
        let community_id = community_id.ok_or_else(|| {
            AppError::invalid_input("Only community events can invite all members")
        })?;
        ids.extend(database.communities().member_ids(community_id).await?);
    }
    let names: Vec<String> = request
        .usernames
        .iter()
        .map(|u| u.trim().to_lowercase())
        .filter(|u| !u.is_empty())
        .collect();
    if !names.is_empty() {
        let (found, missing) = database.users().resolve_usernames(&names).await?;
        if !missing.is_empty() {
            return Err(AppError::not_found(format!("User(s) {}", missing.join(", "))));
        }
        ids.extend(found.into_iter().map(|u| u.id));
    }
    ids.retain(|id| *id != inviter.id);
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Invite users and notify the ones newly invited
async fn invite_and_notify(
    database: &Database,
    inviter: &User,
    event: &CalendarEvent,
    ids: &[Uuid],
) -> Result<usize, AppError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let added = database.calendar().invite(event.id, ids, inviter.id).await?;
    let message = format!(
        "{} invited you to {} on {}",
        inviter.username, event.title, event.date
    );
    let link = format!("/event/{}", event.id);
    let notifications: Vec<NewNotification> = added
        .iter()
        .map(|id| {
            let notification =
                NewNotification::new(*id, notification_types::EVENT_INVITATION, message.clone())
                    .from_user(inviter.username.clone())
                    .with_link(link.clone());
            match event.community_id {
                Some(community_id) => notification.with_community(community_id),
                None => notification,
            }
        })
        .collect();
    notify_all(database, notifications).await;
    Ok(added.len())
}

async fn event_details(
    database: &Database,
    event: CalendarEvent,
    viewer: &User,
) -> Result<EventDetails, AppError> {
    let calendar = database.calendar();
    let rsvp_counts = calendar.rsvp_counts(event.id).await?;
    let user_rsvp = calendar.user_rsvp(event.id, viewer.id).await?;
    let invited = calendar.invited_usernames(event.id).await?;
    Ok(EventDetails {
        event,
        rsvp_counts,
        user_rsvp,
        invited,
    })
}
