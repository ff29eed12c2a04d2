// ABOUTME: Cursor-based pagination for newest-first feeds
// ABOUTME: Opaque cursors encode (created_at millis, row id) so pages stay stable under inserts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::fmt::{self, Display, Formatter};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::limits::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Opaque pagination cursor containing encoded position information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Create a new cursor from the timestamp and id of the last item on a page
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, id: i64) -> Self {
        let cursor_data = format!("{}:{id}", timestamp.timestamp_millis());
        Self(URL_SAFE_NO_PAD.encode(cursor_data.as_bytes()))
    }

    /// Decode cursor into timestamp and id components
    ///
    /// Returns `None` if the cursor is invalid or malformed
    #[must_use]
    pub fn decode(&self) -> Option<(DateTime<Utc>, i64)> {
        let decoded = URL_SAFE_NO_PAD.decode(&self.0).ok()?;
        let decoded_str = String::from_utf8(decoded).ok()?;
        let (timestamp_str, id) = decoded_str.split_once(':')?;

        let timestamp_millis = timestamp_str.parse::<i64>().ok()?;
        let datetime = DateTime::from_timestamp_millis(timestamp_millis)?;
        let id = id.parse::<i64>().ok()?;

        Some((datetime, id))
    }

    /// Get the raw cursor string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create cursor from raw string (query parameters)
    #[must_use]
    pub const fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Display for Cursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Paginated response containing items and pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorPage<T> {
    /// The items in this page
    pub items: Vec<T>,
    /// Cursor pointing to the next (older) page, if any
    pub next_cursor: Option<Cursor>,
    /// Whether there are more items after this page
    pub has_more: bool,
    /// Number of items in this page
    pub count: usize,
}

impl<T> CursorPage<T> {
    /// Create a new cursor page
    #[must_use]
    pub fn new(items: Vec<T>, next_cursor: Option<Cursor>, has_more: bool) -> Self {
        let count = items.len();
        Self {
            items,
            next_cursor,
            has_more,
            count,
        }
    }

    /// Create an empty page
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
            count: 0,
        }
    }

    /// Build a page from `limit + 1` fetched rows.
    ///
    /// The extra row only signals that another page exists; it is dropped and
    /// the cursor is taken from the last row that is kept.
    pub fn from_overfetch<F>(mut rows: Vec<T>, limit: usize, cursor_of: F) -> Self
    where
        F: Fn(&T) -> Cursor,
    {
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        let next_cursor = if has_more {
            rows.last().map(cursor_of)
        } else {
            None
        };
        Self::new(rows, next_cursor, has_more)
    }
}

/// Pagination parameters for cursor-based queries
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    /// Cursor to start after (exclusive)
    pub cursor: Option<Cursor>,
    /// Maximum number of items to return
    pub limit: Option<usize>,
}

impl PaginationParams {
    /// Requested page size clamped to `1..=MAX_PAGE_SIZE`
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_decodes_what_it_encodes() {
        let now = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let cursor = Cursor::new(now, 42);
        assert_eq!(cursor.decode(), Some((now, 42)));
    }

    #[test]
    fn test_malformed_cursor_is_rejected() {
        assert!(Cursor::from_string("not base64 !!".to_owned()).decode().is_none());
        let no_id = URL_SAFE_NO_PAD.encode(b"12345");
        assert!(Cursor::from_string(no_id).decode().is_none());
    }

    #[test]
    fn test_overfetch_sets_next_cursor() {
        let ts = DateTime::from_timestamp_millis(1_000).unwrap();
        let page = CursorPage::from_overfetch(vec![5_i64, 4, 3], 2, |id| Cursor::new(ts, *id));
        assert!(page.has_more);
        assert_eq!(page.items, vec![5, 4]);
        assert_eq!(page.next_cursor.and_then(|c| c.decode()).map(|(_, id)| id), Some(4));

        let last = CursorPage::from_overfetch(vec![2_i64], 2, |id| Cursor::new(ts, *id));
        assert!(!last.has_more);
        assert!(last.next_cursor.is_none());
    }

    #[test]
    fn test_effective_limit_is_clamped() {
        let params = PaginationParams {
            cursor: None,
            limit: Some(10_000),
        };
        assert_eq!(params.effective_limit(), MAX_PAGE_SIZE);
        assert_eq!(PaginationParams::default().effective_limit(), DEFAULT_PAGE_SIZE);
    }
}
