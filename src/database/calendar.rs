// ABOUTME: Calendar event, invitation and RSVP storage
// ABOUTME: Dates are stored as ISO dates and times as HH:MM so they sort as text
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use cpoint_core::errors::{AppError, AppResult};
use cpoint_core::models::{CalendarEvent, ReminderPreference, RsvpCounts, RsvpStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{execute_schema, format_timestamp, parse_timestamp, parse_uuid};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

const EVENT_SELECT: &str = r"
    SELECT e.*, u.username AS creator_username
    FROM calendar_events e
    JOIN users u ON u.id = e.creator_id
";

/// Fields needed to create an event
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Creator
    pub creator_id: Uuid,
    /// Owning community, if any
    pub community_id: Option<i64>,
    /// Title
    pub title: String,
    /// Description
    pub description: Option<String>,
    /// Location
    pub location: Option<String>,
    /// Start date
    pub date: NaiveDate,
    /// End date
    pub end_date: Option<NaiveDate>,
    /// Start time; all-day when absent
    pub start_time: Option<NaiveTime>,
    /// End time
    pub end_time: Option<NaiveTime>,
    /// Reminder preference
    pub notification_preferences: ReminderPreference,
}

/// Editable event fields; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct EventUpdate {
    /// Title
    pub title: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Location
    pub location: Option<String>,
    /// Start date
    pub date: Option<NaiveDate>,
    /// End date
    pub end_date: Option<NaiveDate>,
    /// Start time
    pub start_time: Option<NaiveTime>,
    /// End time
    pub end_time: Option<NaiveTime>,
    /// Reminder preference
    pub notification_preferences: Option<ReminderPreference>,
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Parse `HH:MM` or `HH:MM:SS`
///
/// # Errors
///
/// Returns `InvalidInput` when neither format matches
pub fn parse_event_time(raw: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| AppError::invalid_input(format!("Invalid time '{raw}', expected HH:MM")))
}

/// Parse `YYYY-MM-DD`
///
/// # Errors
///
/// Returns `InvalidInput` for any other format
pub fn parse_event_date(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| AppError::invalid_input(format!("Invalid date '{raw}', expected YYYY-MM-DD")))
}

/// Calendar database operations
pub struct CalendarManager {
    pool: SqlitePool,
}

impl CalendarManager {
    /// Create a new calendar manager
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create calendar tables
    ///
    /// # Errors
    ///
    /// Returns an error if a schema statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        execute_schema(
            &self.pool,
            &[
                r"
                CREATE TABLE IF NOT EXISTS calendar_events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    creator_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    community_id INTEGER REFERENCES communities(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    description TEXT,
                    location TEXT,
                    date TEXT NOT NULL,
                    end_date TEXT,
                    start_time TEXT,
                    end_time TEXT,
                    notification_preferences TEXT NOT NULL DEFAULT 'all',
                    created_at TEXT NOT NULL
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS event_invitations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    event_id INTEGER NOT NULL REFERENCES calendar_events(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    invited_by TEXT REFERENCES users(id) ON DELETE SET NULL,
                    invited_at TEXT NOT NULL,
                    UNIQUE (event_id, user_id)
                )
                ",
                r"
                CREATE TABLE IF NOT EXISTS event_rsvps (
                    event_id INTEGER NOT NULL REFERENCES calendar_events(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    status TEXT NOT NULL,
                    responded_at TEXT NOT NULL,
                    PRIMARY KEY (event_id, user_id)
                )
                ",
                "CREATE INDEX IF NOT EXISTS idx_events_community ON calendar_events(community_id, date)",
                "CREATE INDEX IF NOT EXISTS idx_events_date ON calendar_events(date)",
                "CREATE INDEX IF NOT EXISTS idx_event_invitations_user ON event_invitations(user_id)",
            ],
        )
        .await
    }

    /// Create an event
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn create_event(&self, new: &NewEvent) -> AppResult<CalendarEvent> {
        let result = sqlx::query(
            r"
            INSERT INTO calendar_events (creator_id, community_id, title, description, location,
                                         date, end_date, start_time, end_time,
                                         notification_preferences, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(new.creator_id.to_string())
        .bind(new.community_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.location)
        .bind(format_date(new.date))
        .bind(new.end_date.map(format_date))
        .bind(new.start_time.map(format_time))
        .bind(new.end_time.map(format_time))
        .bind(new.notification_preferences.as_str())
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create event: {e}")))?;

        self.get_event(result.last_insert_rowid())
            .await?
            .ok_or_else(|| AppError::internal("Event vanished after insert"))
    }

    /// Get an event by id
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_event(&self, event_id: i64) -> AppResult<Option<CalendarEvent>> {
        let row = sqlx::query(&format!("{EVENT_SELECT} WHERE e.id = $1"))
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get event: {e}")))?;
        row.map(|r| Self::row_to_event(&r)).transpose()
    }

    /// Apply changes and return the updated event
    ///
    /// # Errors
    ///
    /// Returns an error if the event is missing or the query fails
    pub async fn update_event(&self, event_id: i64, update: &EventUpdate) -> AppResult<CalendarEvent> {
        sqlx::query(
            r"
            UPDATE calendar_events SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                location = COALESCE($4, location),
                date = COALESCE($5, date),
                end_date = COALESCE($6, end_date),
                start_time = COALESCE($7, start_time),
                end_time = COALESCE($8, end_time),
                notification_preferences = COALESCE($9, notification_preferences)
            WHERE id = $1
            ",
        )
        .bind(event_id)
        .bind(&update.title)
        .bind(&update.description)
        .bind(&update.location)
        .bind(update.date.map(format_date))
        .bind(update.end_date.map(format_date))
        .bind(update.start_time.map(format_time))
        .bind(update.end_time.map(format_time))
        .bind(update.notification_preferences.map(|p| p.as_str()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update event: {e}")))?;

        self.get_event(event_id)
            .await?
            .ok_or_else(|| AppError::not_found("Event"))
    }

    /// Delete an event with its invitations and RSVPs
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_event(&self, event_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM calendar_events WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete event: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    /// Events of a community in an optional inclusive date range
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_for_community(
        &self,
        community_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> AppResult<Vec<CalendarEvent>> {
        let rows = sqlx::query(&format!(
            r"{EVENT_SELECT}
            WHERE e.community_id = $1
              AND ($2 IS NULL OR e.date >= $2)
              AND ($3 IS NULL OR e.date <= $3)
            ORDER BY e.date, COALESCE(e.start_time, ''), e.id
            "
        ))
        .bind(community_id)
        .bind(from.map(format_date))
        .bind(to.map(format_date))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list community events: {e}")))?;
        rows.iter().map(Self::row_to_event).collect()
    }

    /// Events a user created or was invited to, in an optional date range
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> AppResult<Vec<CalendarEvent>> {
        let rows = sqlx::query(&format!(
            r"{EVENT_SELECT}
            WHERE (e.creator_id = $1
                   OR EXISTS (SELECT 1 FROM event_invitations i WHERE i.event_id = e.id AND i.user_id = $1))
              AND ($2 IS NULL OR e.date >= $2)
              AND ($3 IS NULL OR e.date <= $3)
            ORDER BY e.date, COALESCE(e.start_time, ''), e.id
            "
        ))
        .bind(user_id.to_string())
        .bind(from.map(format_date))
        .bind(to.map(format_date))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list user events: {e}")))?;
        rows.iter().map(Self::row_to_event).collect()
    }

    /// Events a reminder run may act on.
    ///
    /// Covers events from today through `horizon`, plus later events whose
    /// creation-to-start span is roughly 75-90% elapsed at `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn upcoming_events(
        &self,
        now: DateTime<Utc>,
        horizon: NaiveDate,
    ) -> AppResult<Vec<CalendarEvent>> {
        let rows = sqlx::query(&format!(
            r"{EVENT_SELECT}
            WHERE e.date >= $1
              AND (
                e.date <= $2
                OR (julianday($3) - julianday(e.created_at)) BETWEEN
                    0.74 * (julianday(e.date || ' ' || COALESCE(e.start_time, '00:00')) - julianday(e.created_at))
                    AND 0.91 * (julianday(e.date || ' ' || COALESCE(e.start_time, '00:00')) - julianday(e.created_at))
              )
            ORDER BY e.date, COALESCE(e.start_time, ''), e.id"
        ))
        .bind(format_date(now.date_naive()))
        .bind(format_date(horizon))
        .bind(format_timestamp(now))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list upcoming events: {e}")))?;
        rows.iter().map(Self::row_to_event).collect()
    }

    /// Number of events
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn count_events(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM calendar_events")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count events: {e}")))
    }

    // ========================================================================
    // Invitations and RSVPs
    // ========================================================================

    /// Invite users; returns the ids that were not already invited
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails
    pub async fn invite(
        &self,
        event_id: i64,
        user_ids: &[Uuid],
        invited_by: Uuid,
    ) -> AppResult<Vec<Uuid>> {
        let stamp = format_timestamp(Utc::now());
        let mut added = Vec::new();
        for user_id in user_ids {
            let result = sqlx::query(
                r"
                INSERT OR IGNORE INTO event_invitations (event_id, user_id, invited_by, invited_at)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(event_id)
            .bind(user_id.to_string())
            .bind(invited_by.to_string())
            .bind(&stamp)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to invite to event: {e}")))?;
            if result.rows_affected() > 0 {
                added.push(*user_id);
            }
        }
        Ok(added)
    }

    /// Usernames invited to an event, alphabetical
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn invited_usernames(&self, event_id: i64) -> AppResult<Vec<String>> {
        sqlx::query_scalar(
            r"
            SELECT u.username FROM event_invitations i
            JOIN users u ON u.id = i.user_id
            WHERE i.event_id = $1
            ORDER BY u.username COLLATE NOCASE
            ",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list invitees: {e}")))
    }

    /// Ids invited to an event
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn invited_user_ids(&self, event_id: i64) -> AppResult<Vec<Uuid>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT user_id FROM event_invitations WHERE event_id = $1")
                .bind(event_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to list invitees: {e}")))?;
        ids.iter().map(|id| parse_uuid(id)).collect()
    }

    /// Whether a user was invited to an event
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn is_invited(&self, event_id: i64, user_id: Uuid) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM event_invitations WHERE event_id = $1 AND user_id = $2",
        )
        .bind(event_id)
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to check invitation: {e}")))?;
        Ok(count > 0)
    }

    /// Store or replace a user's RSVP
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn set_rsvp(&self, event_id: i64, user_id: Uuid, status: RsvpStatus) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO event_rsvps (event_id, user_id, status, responded_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(event_id, user_id) DO UPDATE SET status = excluded.status,
                                                         responded_at = excluded.responded_at
            ",
        )
        .bind(event_id)
        .bind(user_id.to_string())
        .bind(status.as_str())
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to store RSVP: {e}")))?;
        Ok(())
    }

    /// RSVP totals of an event
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn rsvp_counts(&self, event_id: i64) -> AppResult<RsvpCounts> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS total FROM event_rsvps WHERE event_id = $1 GROUP BY status",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to count RSVPs: {e}")))?;

        let mut counts = RsvpCounts::default();
        for row in &rows {
            let total: i64 = row.get("total");
            match row.get::<String, _>("status").parse::<RsvpStatus>() {
                Ok(RsvpStatus::Going) => counts.going = total,
                Ok(RsvpStatus::Maybe) => counts.maybe = total,
                Ok(RsvpStatus::NotGoing) => counts.not_going = total,
                _ => {}
            }
        }
        Ok(counts)
    }

    /// A user's RSVP, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn user_rsvp(&self, event_id: i64, user_id: Uuid) -> AppResult<Option<RsvpStatus>> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM event_rsvps WHERE event_id = $1 AND user_id = $2")
                .bind(event_id)
                .bind(user_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Failed to get RSVP: {e}")))?;
        Ok(status.and_then(|s| s.parse().ok()))
    }

    fn row_to_event(row: &SqliteRow) -> AppResult<CalendarEvent> {
        let creator_id: String = row.get("creator_id");
        let created_at: String = row.get("created_at");
        let date: String = row.get("date");
        let end_date: Option<String> = row.get("end_date");
        let start_time: Option<String> = row.get("start_time");
        let end_time: Option<String> = row.get("end_time");
        let preference: String = row.get("notification_preferences");

        Ok(CalendarEvent {
            id: row.get("id"),
            creator_id: parse_uuid(&creator_id)?,
            creator_username: row.get("creator_username"),
            community_id: row.get("community_id"),
            title: row.get("title"),
            description: row.get("description"),
            location: row.get("location"),
            date: parse_event_date(&date)?,
            end_date: end_date.as_deref().map(parse_event_date).transpose()?,
            start_time: start_time.as_deref().map(parse_event_time).transpose()?,
            end_time: end_time.as_deref().map(parse_event_time).transpose()?,
            notification_preferences: ReminderPreference::from_str_or_default(&preference),
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_time_accepts_seconds() {
        assert_eq!(
            parse_event_time("09:30").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert_eq!(
            parse_event_time("09:30:15").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 15).unwrap()
        );
        assert!(parse_event_time("9am").is_err());
    }

    #[test]
    fn test_parse_event_date() {
        assert_eq!(
            parse_event_date("2025-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
        assert!(parse_event_date("01/03/2025").is_err());
    }
}
