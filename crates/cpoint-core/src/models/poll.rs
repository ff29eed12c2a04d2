// ABOUTME: Poll models with options, vote counts and per-caller results
// ABOUTME: Polls are attached to a backing post in a community feed
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    /// Row id
    pub id: i64,
    /// Backing post
    pub post_id: i64,
    /// Community of the backing post
    pub community_id: i64,
    /// Creator account
    pub created_by: Uuid,
    /// Question text
    pub question: String,
    /// Whether a voter may pick only one option
    pub single_vote: bool,
    /// Whether voting is open
    pub is_active: bool,
    /// Created at
    pub created_at: DateTime<Utc>,
    /// Optional deadline
    pub expires_at: Option<DateTime<Utc>>,
}

impl Poll {
    /// Whether the poll still accepts votes at `now`
    #[must_use]
    pub fn accepts_votes(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

/// An option with its tally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOption {
    /// Row id
    pub id: i64,
    /// Owning poll
    pub poll_id: i64,
    /// Option text
    pub text: String,
    /// Number of votes
    pub votes: i64,
}

/// A poll with tallies as seen by one caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResults {
    /// The poll
    pub poll: Poll,
    /// Options in creation order
    pub options: Vec<PollOption>,
    /// Option ids the caller voted for
    pub user_votes: Vec<i64>,
    /// Distinct voters
    pub total_voters: i64,
}
