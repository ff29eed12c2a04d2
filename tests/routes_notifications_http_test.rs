// ABOUTME: HTTP integration tests for the notification inbox
// ABOUTME: Covers listing filters, polling for new items, read state and retention purge
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;
mod helpers;

use axum::http::StatusCode;
use chrono::{Duration, SecondsFormat, Utc};
use common::TestContext;
use cpoint_core::models::NewNotification;
use helpers::axum_test::AxumTestRequest;
use serde_json::Value;
use uuid::Uuid;

async fn seed(ctx: &TestContext, user_id: Uuid, kind: &str, message: &str) -> i64 {
    ctx.database()
        .notifications()
        .create(&NewNotification::new(user_id, kind, message).from_user("system"))
        .await
        .unwrap()
}

async fn list(ctx: &TestContext, token: &str, path: &str) -> Vec<Value> {
    let body: Value = AxumTestRequest::get(path)
        .bearer(token)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    body["notifications"].as_array().unwrap().clone()
}

#[tokio::test]
async fn test_read_state_transitions() {
    let ctx = TestContext::new().await;
    let (alice, token) = ctx.create_user("alice").await;
    let (bob, bob_token) = ctx.create_user("bob").await;
    let first = seed(&ctx, alice.id, "reply", "first").await;
    seed(&ctx, alice.id, "reaction", "second").await;
    let bobs = seed(&ctx, bob.id, "reply", "not yours").await;

    let unread = list(&ctx, &token, "/api/notifications").await;
    assert_eq!(unread.len(), 2);
    assert_eq!(unread[0]["message"], "second");

    AxumTestRequest::post(&format!("/api/notifications/{bobs}/read"))
        .bearer(&token)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::NOT_FOUND);
    AxumTestRequest::post(&format!("/api/notifications/{first}/read"))
        .bearer(&token)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);

    assert_eq!(list(&ctx, &token, "/api/notifications").await.len(), 1);
    assert_eq!(list(&ctx, &token, "/api/notifications?all=true").await.len(), 2);

    let read_all: Value = AxumTestRequest::post("/api/notifications/read-all")
        .bearer(&token)
        .send(ctx.app())
        .await
        .json();
    assert_eq!(read_all["updated"], 1);

    let deleted: Value = AxumTestRequest::delete("/api/notifications/read")
        .bearer(&token)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(deleted["deleted"], 2);
    assert!(list(&ctx, &token, "/api/notifications?all=true").await.is_empty());

    // other inboxes are untouched
    assert_eq!(list(&ctx, &bob_token, "/api/notifications").await.len(), 1);
}

#[tokio::test]
async fn test_check_returns_only_newer_unread() {
    let ctx = TestContext::new().await;
    let (alice, token) = ctx.create_user("alice").await;
    let before = Utc::now() - Duration::seconds(5);
    seed(&ctx, alice.id, "reply", "fresh").await;

    let since = before.to_rfc3339_opts(SecondsFormat::Secs, true);
    let fresh = list(&ctx, &token, &format!("/api/notifications/check?since={since}")).await;
    assert_eq!(fresh.len(), 1);

    let later = (Utc::now() + Duration::minutes(1)).to_rfc3339_opts(SecondsFormat::Secs, true);
    assert!(list(&ctx, &token, &format!("/api/notifications/check?since={later}"))
        .await
        .is_empty());
}

#[tokio::test]
async fn test_repeated_notification_is_refreshed_not_duplicated() {
    let ctx = TestContext::new().await;
    let (alice, token) = ctx.create_user("alice").await;
    let id = seed(&ctx, alice.id, "reply", "old text").await;
    AxumTestRequest::post(&format!("/api/notifications/{id}/read"))
        .bearer(&token)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);

    let again = seed(&ctx, alice.id, "reply", "new text").await;
    assert_eq!(again, id);
    let unread = list(&ctx, &token, "/api/notifications").await;
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0]["message"], "new text");
}

#[tokio::test]
async fn test_old_read_notifications_are_purged_on_list() {
    let ctx = TestContext::new().await;
    let (alice, token) = ctx.create_user("alice").await;
    let stale = seed(&ctx, alice.id, "reply", "stale").await;
    seed(&ctx, alice.id, "reaction", "recent").await;

    let old = (Utc::now() - Duration::days(8)).to_rfc3339_opts(SecondsFormat::Millis, true);
    sqlx::query("UPDATE notifications SET is_read = 1, created_at = $1 WHERE id = $2")
        .bind(old)
        .bind(stale)
        .execute(ctx.database().pool())
        .await
        .unwrap();

    let all = list(&ctx, &token, "/api/notifications?all=true").await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["message"], "recent");
}
