// ABOUTME: Tests for loading server configuration from environment variables
// ABOUTME: Serialized because they mutate process-wide environment state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::env;

use cpoint_server::config::{DatabaseUrl, Environment, ServerConfig};
use serial_test::serial;

const VARS: &[&str] = &[
    "HTTP_PORT",
    "ENVIRONMENT",
    "DATABASE_URL",
    "JWT_SECRET",
    "BCRYPT_COST",
    "SESSION_EXPIRY_HOURS",
    "PUBLIC_BASE_URL",
    "POLL_CRON_API_KEY",
    "CORS_ALLOWED_ORIGINS",
    "ADMIN_USERNAME",
    "ADMIN_EMAIL",
    "ADMIN_PASSWORD",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_without_environment() {
    clear_env();
    let config = ServerConfig::from_env().unwrap();

    assert_eq!(config.http_port, 8081);
    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.public_base_url, "http://localhost:8081");
    assert_eq!(config.cors_allowed_origins, vec!["*".to_owned()]);
    assert!(config.reminders.cron_api_key.is_none());
    assert!(config.admin_bootstrap.is_none());
    // an ephemeral secret is generated
    assert_eq!(config.auth.jwt_secret.len(), 64);
}

#[test]
#[serial]
fn test_values_from_environment() {
    clear_env();
    env::set_var("HTTP_PORT", "9000");
    env::set_var("ENVIRONMENT", "production");
    env::set_var("DATABASE_URL", "sqlite::memory:");
    env::set_var("PUBLIC_BASE_URL", "https://c-point.example/");
    env::set_var("POLL_CRON_API_KEY", " cron-key ");
    env::set_var("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example,");
    env::set_var("ADMIN_USERNAME", "root");
    env::set_var("ADMIN_EMAIL", "root@example.com");
    env::set_var("ADMIN_PASSWORD", "password123");

    let config = ServerConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.http_port, 9000);
    assert!(config.environment.is_production());
    assert_eq!(config.database_url, DatabaseUrl::Memory);
    assert_eq!(config.public_base_url, "https://c-point.example");
    assert_eq!(config.reminders.cron_api_key.as_deref(), Some("cron-key"));
    assert_eq!(
        config.cors_allowed_origins,
        vec!["https://a.example".to_owned(), "https://b.example".to_owned()]
    );
    assert_eq!(config.admin_bootstrap.unwrap().username, "root");
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() {
    clear_env();
    env::set_var("HTTP_PORT", "not-a-port");
    assert!(ServerConfig::from_env().is_err());

    clear_env();
    env::set_var("BCRYPT_COST", "2");
    assert!(ServerConfig::from_env().is_err());

    clear_env();
    env::set_var("SESSION_EXPIRY_HOURS", "0");
    assert!(ServerConfig::from_env().is_err());
    clear_env();
}
