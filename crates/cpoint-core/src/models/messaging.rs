// ABOUTME: Direct message and group chat models
// ABOUTME: Conversation summaries, group chats with unread counts, and chat messages
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A direct message between two users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectMessage {
    /// Row id
    pub id: i64,
    /// Sender account
    pub sender_id: Uuid,
    /// Sender handle
    pub sender_username: String,
    /// Receiver account
    pub receiver_id: Uuid,
    /// Receiver handle
    pub receiver_username: String,
    /// Text body
    pub message: Option<String>,
    /// Optional attached media
    pub image_path: Option<String>,
    /// Whether the receiver has read it
    pub is_read: bool,
    /// Sent at
    pub created_at: DateTime<Utc>,
}

/// One entry of the conversation list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// The other participant
    pub partner_username: String,
    /// Partner profile picture
    pub partner_profile_picture: Option<String>,
    /// Most recent message either way
    pub last_message: DirectMessage,
    /// Messages from the partner not yet read
    pub unread_count: i64,
}

/// A group chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupChat {
    /// Row id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Creator account
    pub creator_id: Uuid,
    /// Inactive groups are hidden
    pub is_active: bool,
    /// Created at
    pub created_at: DateTime<Utc>,
    /// Bumped on every message
    pub updated_at: DateTime<Utc>,
}

/// A group chat member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupChatMember {
    /// Member account
    pub user_id: Uuid,
    /// Member handle
    pub username: String,
    /// `admin` or `member`
    pub role: String,
    /// Joined at
    pub joined_at: DateTime<Utc>,
}

/// A message posted in a group chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupChatMessage {
    /// Row id
    pub id: i64,
    /// Owning group
    pub group_id: i64,
    /// Sender account
    pub sender_id: Uuid,
    /// Sender handle
    pub sender_username: String,
    /// Text body
    pub message: Option<String>,
    /// Optional attached media
    pub image_path: Option<String>,
    /// Sent at
    pub created_at: DateTime<Utc>,
}

/// A group chat as listed for one member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupChatSummary {
    /// The group
    pub group: GroupChat,
    /// Current member count
    pub member_count: i64,
    /// Newest non-deleted message
    pub last_message: Option<GroupChatMessage>,
    /// Messages past the member's read receipt, not sent by the member
    pub unread_count: i64,
}
