// ABOUTME: Domain models shared by the database layer and HTTP routes
// ABOUTME: Users, communities, content, polls, messaging, notifications and calendar
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

mod calendar;
mod community;
mod content;
mod messaging;
mod notification;
mod poll;
mod user;

pub use calendar::{CalendarEvent, EventDetails, ReminderPreference, RsvpCounts, RsvpStatus};
pub use community::{
    is_admin_role, is_qr_invite_email, member_sort_key, qr_invite_email, Community,
    CommunityInvitation, CommunityMember, CommunityRole, MembershipSummary, ViewerRole,
    BUSINESS_COMMUNITY_TYPE,
};
pub use content::{
    normalize_reaction_type, Post, ReactionChange, ReactionSummary, ReactionTarget, Reply,
};
pub use messaging::{
    ConversationSummary, DirectMessage, GroupChat, GroupChatMember, GroupChatMessage,
    GroupChatSummary,
};
pub use notification::{NewNotification, Notification};
pub use poll::{Poll, PollOption, PollResults};
pub use user::{
    sanitize_username, username_candidates, username_stem_from_email, LoginRecord,
    PendingSignup, User, UserProfile,
};
