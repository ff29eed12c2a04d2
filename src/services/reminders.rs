// ABOUTME: Reminder runs for poll milestones and upcoming calendar events
// ABOUTME: Applies the pure reminder rules to stored polls and events, deduplicated per recipient
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use cpoint_core::constants::notification_types::{EVENT_REMINDER, POLL_REMINDER};
use cpoint_core::errors::AppResult;
use cpoint_core::models::{CalendarEvent, NewNotification, Poll};
use cpoint_core::reminders::{
    event_countdown_message, event_progress_due, event_window, event_window_message,
    poll_reminder, progress, PollMilestone, PollReminderContext, EVENT_PROGRESS_LOG_KEY,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::notifier::notify;
use crate::database::Database;

/// Polls closing within this window are checked
const POLL_LOOKAHEAD_HOURS: i64 = 24;

/// Widest fixed event window (one week) plus a day of slack
const EVENT_LOOKAHEAD_DAYS: i64 = 8;

/// Outcome of a poll reminder run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollRunReport {
    /// Polls deactivated because their deadline passed
    pub deactivated: u64,
    /// Polls examined
    pub checked: usize,
    /// Reminders delivered
    pub sent: usize,
}

/// Outcome of an event reminder run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventRunReport {
    /// Events examined
    pub checked: usize,
    /// Reminders delivered
    pub sent: usize,
}

async fn community_name(database: &Database, community_id: Option<i64>) -> AppResult<Option<String>> {
    match community_id {
        Some(id) => Ok(database
            .communities()
            .get_community(id)
            .await?
            .map(|c| c.name)),
        None => Ok(None),
    }
}

/// Deactivate expired polls, then send milestone reminders for polls closing soon
///
/// # Errors
///
/// Returns an error if a query fails
pub async fn run_poll_reminders(database: &Database, now: DateTime<Utc>) -> AppResult<PollRunReport> {
    let polls = database.polls();
    let deactivated = polls.deactivate_expired(now).await?;
    let closing = polls
        .closing_between(now, now + Duration::hours(POLL_LOOKAHEAD_HOURS))
        .await?;

    let mut report = PollRunReport {
        deactivated,
        checked: closing.len(),
        sent: 0,
    };
    for poll in &closing {
        report.sent += remind_poll(database, poll, now).await?;
    }

    info!(
        deactivated = report.deactivated,
        checked = report.checked,
        sent = report.sent,
        "Poll reminder run finished"
    );
    Ok(report)
}

async fn remind_poll(database: &Database, poll: &Poll, now: DateTime<Utc>) -> AppResult<usize> {
    let Some(expires_at) = poll.expires_at else {
        return Ok(0);
    };
    let Some(milestone) =
        progress(poll.created_at, expires_at, now).and_then(PollMilestone::for_progress)
    else {
        return Ok(0);
    };

    let voters: HashSet<_> = database
        .polls()
        .voter_ids(poll.id)
        .await?
        .into_iter()
        .collect();
    let name = community_name(database, Some(poll.community_id)).await?;
    let ctx = PollReminderContext {
        community_name: name.as_deref(),
        vote_count: voters.len() as i64,
        time_remaining: expires_at - now,
    };

    let notifications = database.notifications();
    let mut sent = 0;
    for member in database.communities().member_ids(poll.community_id).await? {
        let Some(due) = poll_reminder(milestone, voters.contains(&member), &ctx) else {
            continue;
        };
        if !notifications
            .claim_poll_reminder(poll.id, member, due.log_key)
            .await?
        {
            continue;
        }
        notify(
            database,
            NewNotification::new(member, POLL_REMINDER, due.message)
                .with_post(poll.post_id)
                .with_community(poll.community_id)
                .with_link(format!("/community/{}/polls", poll.community_id)),
        )
        .await;
        sent += 1;
    }
    debug!(poll_id = poll.id, ?milestone, sent, "Poll reminders sent");
    Ok(sent)
}

/// Send window and countdown reminders to invited participants of upcoming events
///
/// # Errors
///
/// Returns an error if a query fails
pub async fn run_event_reminders(database: &Database, now: DateTime<Utc>) -> AppResult<EventRunReport> {
    let horizon = now.date_naive() + Duration::days(EVENT_LOOKAHEAD_DAYS);
    let events = database.calendar().upcoming_events(now, horizon).await?;
    let mut report = EventRunReport {
        checked: events.len(),
        sent: 0,
    };
    for event in &events {
        report.sent += remind_event(database, event, now).await?;
    }
    info!(
        checked = report.checked,
        sent = report.sent,
        "Event reminder run finished"
    );
    Ok(report)
}

async fn remind_event(database: &Database, event: &CalendarEvent, now: DateTime<Utc>) -> AppResult<usize> {
    let starts_at = event.starts_at();
    if starts_at <= now {
        return Ok(0);
    }
    let until = starts_at - now;
    let hours_until = until.num_seconds() as f64 / 3600.0;
    let preference = event.notification_preferences;

    let mut due = Vec::new();
    let name = community_name(database, event.community_id).await?;
    if let Some(window) = event_window(hours_until, preference) {
        due.push((
            window.log_key(),
            event_window_message(window, &event.title, name.as_deref()),
        ));
    }
    if event_progress_due(event.created_at, starts_at, now, preference) {
        due.push((
            EVENT_PROGRESS_LOG_KEY,
            event_countdown_message(&event.title, name.as_deref(), until),
        ));
    }
    if due.is_empty() {
        return Ok(0);
    }

    let notifications = database.notifications();
    let mut sent = 0;
    for participant in database.calendar().invited_user_ids(event.id).await? {
        for (log_key, message) in &due {
            if !notifications
                .claim_event_reminder(event.id, participant, log_key)
                .await?
            {
                continue;
            }
            let mut notification = NewNotification::new(participant, EVENT_REMINDER, message.clone())
                .with_link(format!("/calendar/{}", event.id));
            if let Some(community_id) = event.community_id {
                notification = notification.with_community(community_id);
            }
            notify(database, notification).await;
            sent += 1;
        }
    }
    Ok(sent)
}

/// Run both reminder checks, then purge expired remember tokens, every
/// `interval` until the runtime shuts down
#[must_use]
pub fn spawn_reminder_loop(database: Arc<Database>, interval: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "Reminder loop started");
        loop {
            ticker.tick().await;
            let now = Utc::now();
            if let Err(e) = run_poll_reminders(&database, now).await {
                error!("Poll reminder run failed: {e}");
            }
            if let Err(e) = run_event_reminders(&database, now).await {
                error!("Event reminder run failed: {e}");
            }
            match database.users().delete_expired_remember_tokens(now).await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "Expired remember tokens purged"),
                Err(e) => error!("Remember token purge failed: {e}"),
            }
        }
    })
}
