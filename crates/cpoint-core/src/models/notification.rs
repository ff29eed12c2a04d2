// ABOUTME: In-app notification model and the key used for upserts
// ABOUTME: A notification is identified by recipient, sender, type, post and community
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Row id
    pub id: i64,
    /// Recipient account
    pub user_id: Uuid,
    /// Username that triggered it, if any
    pub from_user: Option<String>,
    /// Notification type, e.g. `reply` or `poll_reminder`
    #[serde(rename = "type")]
    pub notification_type: String,
    /// Related post
    pub post_id: Option<i64>,
    /// Related community
    pub community_id: Option<i64>,
    /// Text shown to the user
    pub message: String,
    /// In-app link
    pub link: Option<String>,
    /// Read flag
    pub is_read: bool,
    /// Created or last refreshed at
    pub created_at: DateTime<Utc>,
}

/// Input for creating or refreshing a notification
#[derive(Debug, Clone)]
pub struct NewNotification {
    /// Recipient account
    pub user_id: Uuid,
    /// Username that triggered it
    pub from_user: Option<String>,
    /// Notification type
    pub notification_type: String,
    /// Related post
    pub post_id: Option<i64>,
    /// Related community
    pub community_id: Option<i64>,
    /// Text shown to the user
    pub message: String,
    /// In-app link
    pub link: Option<String>,
}

impl NewNotification {
    /// Start a notification for `user_id` of the given type
    pub fn new(user_id: Uuid, notification_type: &str, message: impl Into<String>) -> Self {
        Self {
            user_id,
            from_user: None,
            notification_type: notification_type.to_owned(),
            post_id: None,
            community_id: None,
            message: message.into(),
            link: None,
        }
    }

    /// Set the triggering user
    #[must_use]
    pub fn from_user(mut self, username: impl Into<String>) -> Self {
        self.from_user = Some(username.into());
        self
    }

    /// Set the related post
    #[must_use]
    pub const fn with_post(mut self, post_id: i64) -> Self {
        self.post_id = Some(post_id);
        self
    }

    /// Set the related community
    #[must_use]
    pub const fn with_community(mut self, community_id: i64) -> Self {
        self.community_id = Some(community_id);
        self
    }

    /// Set the in-app link
    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}
