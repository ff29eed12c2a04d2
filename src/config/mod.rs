// ABOUTME: Configuration module entry point
// ABOUTME: Re-exports the environment-driven server configuration types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

/// Environment variable parsing
pub mod environment;

pub use environment::{
    AdminBootstrap, AuthConfig, DatabaseUrl, Environment, LogLevel, MailConfig, ReminderConfig,
    ServerConfig, UploadConfig,
};
