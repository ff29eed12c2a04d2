// ABOUTME: Pure classification of poll milestones and event reminder windows
// ABOUTME: Decides which reminder is due and composes its message; delivery lives in the server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

//! # Reminder Rules
//!
//! Polls remind members at three points of their lifetime, measured as the
//! fraction of time elapsed between creation and deadline:
//!
//! | progress        | recipients | log key        |
//! |-----------------|------------|----------------|
//! | `[0.20, 0.35)`  | non-voters | `25`           |
//! | `[0.45, 0.60)`  | non-voters | `50`           |
//! | `[0.75, 0.90)`  | non-voters | `80_nonvoter`  |
//! | `[0.75, 0.90)`  | voters     | `80_voter`     |
//!
//! Events remind invited participants one week, one day and one hour before
//! the start (first matching window wins), and once more when 75-90% of the
//! time between creation and start has passed.

use chrono::{DateTime, Duration, Utc};

use crate::models::ReminderPreference;

/// Poll lifetime checkpoint
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMilestone {
    /// Roughly a quarter of the way through
    Quarter,
    /// Roughly halfway
    Half,
    /// Close to the deadline
    Closing,
}

impl PollMilestone {
    /// Milestone for a progress fraction, if any
    #[must_use]
    pub fn for_progress(progress: f64) -> Option<Self> {
        if (0.20..0.35).contains(&progress) {
            Some(Self::Quarter)
        } else if (0.45..0.60).contains(&progress) {
            Some(Self::Half)
        } else if (0.75..0.90).contains(&progress) {
            Some(Self::Closing)
        } else {
            None
        }
    }
}

/// Fraction of the interval `[start, end]` elapsed at `now`.
///
/// Returns `None` for empty or inverted intervals.
#[must_use]
pub fn progress(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Option<f64> {
    let total = (end - start).num_milliseconds();
    if total <= 0 {
        return None;
    }
    let elapsed = (now - start).num_milliseconds();
    Some(elapsed as f64 / total as f64)
}

/// Facts about a poll needed to word its reminders
#[derive(Debug, Clone, Copy)]
pub struct PollReminderContext<'a> {
    /// Community name, when known
    pub community_name: Option<&'a str>,
    /// Distinct voters so far
    pub vote_count: i64,
    /// Time left until the deadline
    pub time_remaining: Duration,
}

/// A reminder that is due for one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueReminder {
    /// Deduplication key stored in the reminder log
    pub log_key: &'static str,
    /// Notification text
    pub message: String,
}

/// Reminder due for a poll recipient at a milestone, if any.
///
/// Voters only hear about the closing milestone.
#[must_use]
pub fn poll_reminder(
    milestone: PollMilestone,
    has_voted: bool,
    ctx: &PollReminderContext<'_>,
) -> Option<DueReminder> {
    let community = ctx.community_name.filter(|name| !name.is_empty());
    match (milestone, has_voted) {
        (PollMilestone::Quarter, false) => Some(DueReminder {
            log_key: "25",
            message: community.map_or_else(
                || format!("📊 {} voted. Vote now!", ctx.vote_count),
                |name| format!("📊 {} voted in {name}. Vote now!", ctx.vote_count),
            ),
        }),
        (PollMilestone::Half, false) => {
            let (noun, verb) = if ctx.vote_count == 1 {
                ("member", "has")
            } else {
                ("members", "have")
            };
            let subject = community.map_or_else(
                || format!("{} {noun}", ctx.vote_count),
                |name| format!("{} {name} {noun}", ctx.vote_count),
            );
            Some(DueReminder {
                log_key: "50",
                message: format!("📊 {subject} {verb} voted, go vote on the poll!"),
            })
        }
        (PollMilestone::Closing, false) => Some(DueReminder {
            log_key: "80_nonvoter",
            message: format!(
                "⏰ The poll is closing {}, go vote!",
                closing_phrase(ctx.time_remaining)
            ),
        }),
        (PollMilestone::Closing, true) => Some(DueReminder {
            log_key: "80_voter",
            message: community.map_or_else(
                || "📋 Poll closing. Review results!".to_owned(),
                |name| format!("📋 Poll in {name} closing. Review results!"),
            ),
        }),
        (PollMilestone::Quarter | PollMilestone::Half, true) => None,
    }
}

/// "in 3 days", "in 5 hours" or "soon"
fn closing_phrase(remaining: Duration) -> String {
    let days = remaining.num_days().max(0);
    let hours = remaining.num_hours().max(0);
    if days > 1 {
        format!("in {days} days")
    } else if hours > 1 {
        format!("in {hours} hours")
    } else {
        "soon".to_owned()
    }
}

/// Fixed reminder windows before an event starts
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventWindow {
    /// 167 to 169 hours before
    OneWeek,
    /// 23 to 25 hours before
    OneDay,
    /// 54 to 66 minutes before
    OneHour,
}

impl EventWindow {
    /// Deduplication key stored in the reminder log
    #[must_use]
    pub const fn log_key(self) -> &'static str {
        match self {
            Self::OneWeek => "1_week",
            Self::OneDay => "1_day",
            Self::OneHour => "1_hour",
        }
    }

    const fn enabled_by(self, preference: ReminderPreference) -> bool {
        matches!(
            (self, preference),
            (_, ReminderPreference::All)
                | (Self::OneWeek, ReminderPreference::OneWeek)
                | (Self::OneDay, ReminderPreference::OneDay)
                | (Self::OneHour, ReminderPreference::OneHour)
        )
    }
}

/// Log key of the progress-based event reminder
pub const EVENT_PROGRESS_LOG_KEY: &str = "80_percent";

/// The fixed window `hours_until` falls into, honouring the preference.
///
/// Windows are tried from the longest to the shortest and the first enabled
/// match wins.
#[must_use]
pub fn event_window(hours_until: f64, preference: ReminderPreference) -> Option<EventWindow> {
    let candidates = [
        (EventWindow::OneWeek, 167.0..=169.0),
        (EventWindow::OneDay, 23.0..=25.0),
        (EventWindow::OneHour, 0.9..=1.1),
    ];
    candidates
        .into_iter()
        .find(|(window, range)| window.enabled_by(preference) && range.contains(&hours_until))
        .map(|(window, _)| window)
}

/// Whether the progress reminder is due: 75-90% of creation-to-start elapsed
#[must_use]
pub fn event_progress_due(
    created_at: DateTime<Utc>,
    starts_at: DateTime<Utc>,
    now: DateTime<Utc>,
    preference: ReminderPreference,
) -> bool {
    preference != ReminderPreference::None
        && progress(created_at, starts_at, now).is_some_and(|p| (0.75..0.90).contains(&p))
}

/// Message for a fixed-window event reminder
#[must_use]
pub fn event_window_message(window: EventWindow, title: &str, community: Option<&str>) -> String {
    let (icon, when) = match window {
        EventWindow::OneWeek => ("📅", "in 1 week"),
        EventWindow::OneDay => ("📅", "tomorrow"),
        EventWindow::OneHour => ("⏰", "in 1 hour!"),
    };
    match community.filter(|name| !name.is_empty()) {
        Some(name) => format!("{icon} Event in {name}: '{title}' {when}"),
        None => format!("{icon} Event '{title}' {when}"),
    }
}

/// Message for the progress-based event reminder
#[must_use]
pub fn event_countdown_message(title: &str, community: Option<&str>, until: Duration) -> String {
    let days = until.num_days();
    let hours = until.num_hours();
    let when = if days > 1 {
        format!("in {days} days")
    } else if hours > 1 {
        format!("in {hours} hours")
    } else {
        "starting soon!".to_owned()
    };
    match community.filter(|name| !name.is_empty()) {
        Some(name) => format!("📆 Event in {name}: '{title}' {when}"),
        None => format!("📆 Event '{title}' {when}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(remaining: Duration) -> PollReminderContext<'static> {
        PollReminderContext {
            community_name: Some("Gym"),
            vote_count: 1,
            time_remaining: remaining,
        }
    }

    #[test]
    fn test_milestone_boundaries() {
        assert_eq!(PollMilestone::for_progress(0.19), None);
        assert_eq!(PollMilestone::for_progress(0.20), Some(PollMilestone::Quarter));
        assert_eq!(PollMilestone::for_progress(0.35), None);
        assert_eq!(PollMilestone::for_progress(0.50), Some(PollMilestone::Half));
        assert_eq!(PollMilestone::for_progress(0.89), Some(PollMilestone::Closing));
        assert_eq!(PollMilestone::for_progress(0.90), None);
    }

    #[test]
    fn test_progress_fraction() {
        let start = DateTime::from_timestamp(0, 0).unwrap();
        let end = start + Duration::hours(10);
        assert!((progress(start, end, start + Duration::hours(5)).unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(progress(end, start, start), None);
    }

    #[test]
    fn test_voters_only_hear_about_closing() {
        let c = ctx(Duration::hours(3));
        assert!(poll_reminder(PollMilestone::Quarter, true, &c).is_none());
        assert!(poll_reminder(PollMilestone::Half, true, &c).is_none());
        let voter = poll_reminder(PollMilestone::Closing, true, &c).unwrap();
        assert_eq!(voter.log_key, "80_voter");
        assert_eq!(voter.message, "📋 Poll in Gym closing. Review results!");
    }

    #[test]
    fn test_half_milestone_grammar() {
        let single = poll_reminder(PollMilestone::Half, false, &ctx(Duration::hours(5))).unwrap();
        assert_eq!(single.message, "📊 1 Gym member has voted, go vote on the poll!");
        let many = PollReminderContext {
            community_name: None,
            vote_count: 4,
            time_remaining: Duration::hours(5),
        };
        let plural = poll_reminder(PollMilestone::Half, false, &many).unwrap();
        assert_eq!(plural.message, "📊 4 members have voted, go vote on the poll!");
    }

    #[test]
    fn test_closing_phrase_uses_days_hours_or_soon() {
        let days = poll_reminder(PollMilestone::Closing, false, &ctx(Duration::days(3))).unwrap();
        assert!(days.message.contains("in 3 days"));
        let hours = poll_reminder(PollMilestone::Closing, false, &ctx(Duration::hours(5))).unwrap();
        assert!(hours.message.contains("in 5 hours"));
        let soon = poll_reminder(PollMilestone::Closing, false, &ctx(Duration::minutes(30))).unwrap();
        assert!(soon.message.contains("closing soon"));
    }

    #[test]
    fn test_event_windows_respect_preferences() {
        assert_eq!(event_window(168.0, ReminderPreference::All), Some(EventWindow::OneWeek));
        assert_eq!(event_window(24.0, ReminderPreference::All), Some(EventWindow::OneDay));
        assert_eq!(event_window(1.0, ReminderPreference::OneHour), Some(EventWindow::OneHour));
        assert_eq!(event_window(24.0, ReminderPreference::OneWeek), None);
        assert_eq!(event_window(50.0, ReminderPreference::All), None);
        assert_eq!(event_window(1.0, ReminderPreference::None), None);
    }

    #[test]
    fn test_event_progress_window() {
        let created = DateTime::from_timestamp(0, 0).unwrap();
        let starts = created + Duration::hours(100);
        let due_at = created + Duration::hours(80);
        assert!(event_progress_due(created, starts, due_at, ReminderPreference::All));
        assert!(!event_progress_due(created, starts, due_at, ReminderPreference::None));
        assert!(!event_progress_due(created, starts, created + Duration::hours(50), ReminderPreference::All));
    }

    #[test]
    fn test_event_messages() {
        assert_eq!(
            event_window_message(EventWindow::OneDay, "Leg day", Some("Gym")),
            "📅 Event in Gym: 'Leg day' tomorrow"
        );
        assert_eq!(
            event_countdown_message("Leg day", None, Duration::hours(20)),
            "📆 Event 'Leg day' in 20 hours"
        );
    }
}
