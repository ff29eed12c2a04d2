// ABOUTME: Domain service layer for business logic extracted from route handlers
// ABOUTME: Accounts, membership cascades, reminders, email and media storage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

//! Domain service layer
//!
//! Route handlers parse requests and shape responses; the rules that span
//! several tables (membership cascades, signup promotion, reminder runs)
//! live here so they can be exercised without HTTP.

/// Signup, verification and admin bootstrap
pub mod accounts;

/// Outgoing email backends and templates
pub mod mailer;

/// Upload naming and storage
pub mod media;

/// Community membership rules
pub mod membership;

/// Best-effort notification delivery
pub mod notifier;

/// Poll and event reminder runs
pub mod reminders;

/// Request field validation
pub mod validation;
