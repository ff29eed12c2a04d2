// ABOUTME: Core types and pure domain logic for the C-Point community platform
// ABOUTME: Foundation crate with error handling, pagination, models, hierarchy and reminder rules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

#![deny(unsafe_code)]

//! # C-Point Core
//!
//! Foundation crate shared by the server. It holds everything that does not
//! need a database or an HTTP stack, so it changes rarely and compiles once.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Application-wide limits, token lifetimes and upload rules
//! - **pagination**: Cursor-based pagination for feeds
//! - **models**: Domain models for users, communities, content and events
//! - **hierarchy**: Parent/sub-community tree walks
//! - **reminders**: Poll milestone and event reminder rules

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Cursor-based pagination for newest-first feeds
pub mod pagination;

/// Domain models
pub mod models;

/// Community forest walks used by membership cascades
pub mod hierarchy;

/// Poll and event reminder classification
pub mod reminders;
