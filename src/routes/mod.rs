// ABOUTME: Route module organization for the C-Point HTTP API
// ABOUTME: One module per domain, each exposing a `*Routes` type that builds its router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

//! Route module for the C-Point server
//!
//! Each domain module contains only route definitions and thin handler
//! functions that delegate to the database managers and service layer.

/// Superuser routes
pub mod admin;
/// Signup, login, sessions and password routes
pub mod auth;
/// Calendar events and RSVPs
pub mod calendar;
/// Communities, membership and invitations
pub mod communities;
/// Reminder cron endpoints
pub mod cron;
/// Group chats
pub mod group_chats;
/// Liveness and readiness probes
pub mod health;
/// Direct messages
pub mod messages;
/// In-app notifications
pub mod notifications;
/// Polls
pub mod polls;
/// Posts, replies and reactions
pub mod posts;
/// Profiles and onboarding
pub mod profile;
/// Media uploads
pub mod uploads;

pub use admin::AdminRoutes;
pub use auth::AuthRoutes;
pub use calendar::CalendarRoutes;
pub use communities::CommunityRoutes;
pub use cron::CronRoutes;
pub use group_chats::GroupChatRoutes;
pub use health::HealthRoutes;
pub use messages::MessageRoutes;
pub use notifications::NotificationRoutes;
pub use polls::PollRoutes;
pub use posts::PostRoutes;
pub use profile::ProfileRoutes;
pub use uploads::UploadRoutes;
