// ABOUTME: Application-wide constants grouped by domain
// ABOUTME: Limits, token lifetimes, reminder windows and upload rules shared by all crates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

/// Service identity
pub mod service {
    /// Default service name used in logs
    pub const SERVICE_NAME: &str = "cpoint-server";
    /// Version string reported in API metadata
    pub const API_VERSION: &str = "1.0";
}

/// Size and count limits
pub mod limits {
    /// Default page size for feeds and lists
    pub const DEFAULT_PAGE_SIZE: usize = 20;
    /// Maximum page size for feeds and lists
    pub const MAX_PAGE_SIZE: usize = 100;
    /// Default number of messages returned per fetch
    pub const DEFAULT_MESSAGE_LIMIT: i64 = 50;
    /// Maximum number of messages returned per fetch
    pub const MAX_MESSAGE_LIMIT: i64 = 100;
    /// Maximum members of a group chat, creator included in the check of others
    pub const MAX_GROUP_MEMBERS: usize = 5;
    /// Maximum group chat name length
    pub const MAX_GROUP_NAME_LEN: usize = 100;
    /// Minimum password length
    pub const MIN_PASSWORD_LEN: usize = 6;
    /// Maximum post or reply length
    pub const MAX_POST_LEN: usize = 5000;
    /// Maximum community name length
    pub const MAX_COMMUNITY_NAME_LEN: usize = 120;
    /// Minimum options per poll
    pub const MIN_POLL_OPTIONS: usize = 2;
    /// Maximum options per poll
    pub const MAX_POLL_OPTIONS: usize = 10;
    /// Maximum notifications returned by a listing
    pub const NOTIFICATION_LIST_LIMIT: i64 = 50;
    /// Maximum notifications returned by a "check new" poll
    pub const NOTIFICATION_CHECK_LIMIT: i64 = 10;
    /// Read notifications older than this many days are purged
    pub const NOTIFICATION_RETENTION_DAYS: i64 = 7;
    /// Maximum broadcast title length
    pub const MAX_BROADCAST_TITLE_LEN: usize = 140;
    /// Maximum composed broadcast message length
    pub const MAX_BROADCAST_MESSAGE_LEN: usize = 2000;
    /// Length of generated community join codes
    pub const JOIN_CODE_LEN: usize = 8;
}

/// Authentication constants
pub mod auth {
    /// Session cookie name
    pub const SESSION_COOKIE: &str = "auth_token";
    /// Remember-me cookie name
    pub const REMEMBER_COOKIE: &str = "remember_token";
    /// Remember token lifetime in days
    pub const REMEMBER_TOKEN_DAYS: i64 = 30;
    /// Random bytes in a remember token before encoding
    pub const REMEMBER_TOKEN_BYTES: usize = 48;
    /// Email verification link lifetime in hours
    pub const VERIFICATION_TOKEN_HOURS: i64 = 24;
    /// JWT audience for session tokens
    pub const SESSION_AUDIENCE: &str = "cpoint-session";
    /// JWT audience for email verification tokens
    pub const VERIFICATION_AUDIENCE: &str = "cpoint-email-verification";
    /// JWT issuer
    pub const TOKEN_ISSUER: &str = "cpoint";
    /// Username reserved for the bootstrap superuser, hidden from member lists
    pub const APP_ADMIN_USERNAME: &str = "admin";
    /// Fallback username stem when an email has no usable local part
    pub const FALLBACK_USERNAME: &str = "user";
    /// Email domain marking QR invitations
    pub const QR_INVITE_EMAIL_DOMAIN: &str = "placeholder.local";
    /// Email prefix marking QR invitations
    pub const QR_INVITE_EMAIL_PREFIX: &str = "qr-invite-";
}

/// Notification type identifiers
pub mod notification_types {
    /// Poll reminder milestones
    pub const POLL_REMINDER: &str = "poll_reminder";
    /// Event reminder windows
    pub const EVENT_REMINDER: &str = "event_reminder";
    /// Someone replied to your post
    pub const REPLY: &str = "reply";
    /// Someone reacted to your post or reply
    pub const REACTION: &str = "reaction";
    /// New post in one of your communities
    pub const COMMUNITY_POST: &str = "community_post";
    /// New member joined a community you own
    pub const NEW_MEMBER: &str = "new_member";
    /// You were invited to an event
    pub const EVENT_INVITATION: &str = "event_invitation";
    /// Your role changed in a community
    pub const ROLE_CHANGE: &str = "role_change";
    /// Prefix of admin broadcast types; the timestamp is appended
    pub const ADMIN_BROADCAST_PREFIX: &str = "admin_broadcast";
}

/// Upload rules
pub mod uploads {
    /// Allowed file extensions (lowercase, without the dot)
    pub const ALLOWED_EXTENSIONS: &[&str] = &[
        "png", "jpg", "jpeg", "gif", "webp", "mp4", "webm", "mov", "m4v", "avi", "m4a", "mp3",
        "ogg", "wav", "opus",
    ];
    /// Allowed upload subfolders
    pub const ALLOWED_SUBFOLDERS: &[&str] = &[
        "posts",
        "replies",
        "messages",
        "profile_pictures",
        "communities",
        "group_chats",
    ];
    /// Public path prefix of stored uploads
    pub const UPLOADS_PREFIX: &str = "uploads/";
}
