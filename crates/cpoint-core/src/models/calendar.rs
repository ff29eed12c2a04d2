// ABOUTME: Calendar event, RSVP and reminder preference models
// ABOUTME: Events carry a date with optional times; their start instant is computed in UTC
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// Which reminders an event's participants receive
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ReminderPreference {
    /// One week before
    #[serde(rename = "1_week")]
    OneWeek,
    /// One day before
    #[serde(rename = "1_day")]
    OneDay,
    /// One hour before
    #[serde(rename = "1_hour")]
    OneHour,
    /// Every reminder window
    #[default]
    #[serde(rename = "all")]
    All,
    /// No reminders
    #[serde(rename = "none")]
    None,
}

impl ReminderPreference {
    /// Database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneWeek => "1_week",
            Self::OneDay => "1_day",
            Self::OneHour => "1_hour",
            Self::All => "all",
            Self::None => "none",
        }
    }

    /// Parse a stored value, falling back to `all` for unknown input
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl Display for ReminderPreference {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReminderPreference {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1_week" => Ok(Self::OneWeek),
            "1_day" => Ok(Self::OneDay),
            "1_hour" => Ok(Self::OneHour),
            "all" => Ok(Self::All),
            "none" => Ok(Self::None),
            _ => Err(AppError::invalid_input(format!(
                "Invalid notification preference: {s}"
            ))),
        }
    }
}

/// RSVP answer
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RsvpStatus {
    /// Attending
    Going,
    /// Undecided
    Maybe,
    /// Not attending
    NotGoing,
}

impl RsvpStatus {
    /// Database string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Going => "going",
            Self::Maybe => "maybe",
            Self::NotGoing => "not_going",
        }
    }
}

impl Display for RsvpStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RsvpStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "going" | "yes" => Ok(Self::Going),
            "maybe" => Ok(Self::Maybe),
            "not_going" | "no" => Ok(Self::NotGoing),
            _ => Err(AppError::invalid_input(format!("Invalid RSVP status: {s}"))),
        }
    }
}

/// A calendar event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Row id
    pub id: i64,
    /// Creator account
    pub creator_id: Uuid,
    /// Creator handle
    pub creator_username: String,
    /// Community, when the event belongs to one
    pub community_id: Option<i64>,
    /// Title
    pub title: String,
    /// Description
    pub description: Option<String>,
    /// Location
    pub location: Option<String>,
    /// Start date
    pub date: NaiveDate,
    /// End date for multi-day events
    pub end_date: Option<NaiveDate>,
    /// Start time; all-day when absent
    pub start_time: Option<NaiveTime>,
    /// End time
    pub end_time: Option<NaiveTime>,
    /// Reminder preference
    pub notification_preferences: ReminderPreference,
    /// Created at
    pub created_at: DateTime<Utc>,
}

impl CalendarEvent {
    /// The instant the event starts; all-day events start at midnight UTC
    #[must_use]
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.date
            .and_time(self.start_time.unwrap_or(NaiveTime::MIN))
            .and_utc()
    }
}

/// RSVP tallies for an event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RsvpCounts {
    /// Going
    pub going: i64,
    /// Maybe
    pub maybe: i64,
    /// Not going
    pub not_going: i64,
}

/// An event with its RSVP state for one caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetails {
    /// The event
    pub event: CalendarEvent,
    /// Tallies
    pub rsvp_counts: RsvpCounts,
    /// The caller's answer
    pub user_rsvp: Option<RsvpStatus>,
    /// Invited usernames
    pub invited: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_parsing_defaults_to_all() {
        assert_eq!(ReminderPreference::from_str_or_default("1_day"), ReminderPreference::OneDay);
        assert_eq!(ReminderPreference::from_str_or_default("weekly"), ReminderPreference::All);
    }

    #[test]
    fn test_all_day_event_starts_at_midnight() {
        let event = CalendarEvent {
            id: 1,
            creator_id: Uuid::new_v4(),
            creator_username: "sam".to_owned(),
            community_id: None,
            title: "Meetup".to_owned(),
            description: None,
            location: None,
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            end_date: None,
            start_time: None,
            end_time: None,
            notification_preferences: ReminderPreference::All,
            created_at: Utc::now(),
        };
        assert_eq!(event.starts_at().to_rfc3339(), "2025-03-14T00:00:00+00:00");
    }
}
