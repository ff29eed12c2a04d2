// ABOUTME: Post, reply and reaction models for community feeds
// ABOUTME: Reaction summaries aggregate counts per reaction type plus the caller's own reaction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Longest accepted reaction identifier
const MAX_REACTION_TYPE_LEN: usize = 32;

/// A post in a community feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Row id
    pub id: i64,
    /// Owning community
    pub community_id: i64,
    /// Author account
    pub author_id: Uuid,
    /// Author handle
    pub author_username: String,
    /// Body text
    pub content: String,
    /// Optional attached media
    pub image_path: Option<String>,
    /// Created at
    pub created_at: DateTime<Utc>,
    /// Last edit time
    pub edited_at: Option<DateTime<Utc>>,
}

/// A reply to a post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    /// Row id
    pub id: i64,
    /// Parent post
    pub post_id: i64,
    /// Author account
    pub author_id: Uuid,
    /// Author handle
    pub author_username: String,
    /// Body text
    pub content: String,
    /// Optional attached media
    pub image_path: Option<String>,
    /// Created at
    pub created_at: DateTime<Utc>,
}

/// What a reaction is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionTarget {
    /// A post
    Post(i64),
    /// A reply
    Reply(i64),
}

/// Aggregated reactions on a post or reply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReactionSummary {
    /// Count per reaction type
    pub counts: BTreeMap<String, i64>,
    /// The caller's own reaction, if any
    pub user_reaction: Option<String>,
}

impl ReactionSummary {
    /// Total number of reactions
    #[must_use]
    pub fn total(&self) -> i64 {
        self.counts.values().sum()
    }
}

/// Result of reacting: the toggle may add, replace or remove
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReactionChange {
    /// A new reaction was stored
    Added,
    /// An existing reaction was switched to another type
    Replaced,
    /// The same reaction was sent again and removed
    Removed,
}

/// Validate and normalize a reaction type such as `like` or `fire`
///
/// # Errors
///
/// Returns an error if the type is empty, too long, or has characters other
/// than ASCII letters, digits and `_`
pub fn normalize_reaction_type(raw: &str) -> AppResult<String> {
    let value = raw.trim().to_lowercase();
    if value.is_empty() {
        return Err(AppError::missing_field("reaction_type"));
    }
    if value.len() > MAX_REACTION_TYPE_LEN
        || !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AppError::invalid_input(format!(
            "Invalid reaction type: {raw}"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_reaction_type() {
        assert_eq!(normalize_reaction_type(" Like ").unwrap(), "like");
        assert!(normalize_reaction_type("").is_err());
        assert!(normalize_reaction_type("drop table").is_err());
    }

    #[test]
    fn test_summary_total() {
        let mut summary = ReactionSummary::default();
        summary.counts.insert("like".to_owned(), 3);
        summary.counts.insert("fire".to_owned(), 2);
        assert_eq!(summary.total(), 5);
    }
}
