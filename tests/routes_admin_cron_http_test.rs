// ABOUTME: HTTP integration tests for superuser administration and reminder cron endpoints
// ABOUTME: Covers account management, broadcasts, cron key checks and reminder deduplication
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;
mod helpers;

use axum::http::StatusCode;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use common::TestContext;
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};

async fn notification_types(ctx: &TestContext, token: &str) -> Vec<String> {
    let body: Value = AxumTestRequest::get("/api/notifications")
        .bearer(token)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    body["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["type"].as_str().unwrap().to_owned())
        .collect()
}

fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[tokio::test]
async fn test_admin_endpoints_require_superuser() {
    let ctx = TestContext::new().await;
    let (_, member) = ctx.create_user("member").await;

    for path in ["/api/admin/users", "/api/admin/stats"] {
        AxumTestRequest::get(path)
            .bearer(&member)
            .send(ctx.app())
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
    AxumTestRequest::post("/api/admin/broadcast")
        .bearer(&member)
        .json(&json!({ "message": "hello" }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::FORBIDDEN);
    AxumTestRequest::get("/api/admin/stats")
        .send(ctx.app())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_users_and_stats() {
    let ctx = TestContext::new().await;
    let (_, admin) = ctx.create_admin("root").await;
    let (_, alice) = ctx.create_user("alice").await;
    ctx.simple_community(&alice, "Garden").await;

    let users: Value = AxumTestRequest::get("/api/admin/users")
        .bearer(&admin)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    let users = users["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));

    let stats: Value = AxumTestRequest::get("/api/admin/stats")
        .bearer(&admin)
        .send(ctx.app())
        .await
        .json();
    assert_eq!(stats["users"], 2);
    assert_eq!(stats["communities"], 1);
    assert_eq!(stats["posts"], 0);
    assert_eq!(stats["events"], 0);
}

#[tokio::test]
async fn test_deactivate_and_delete_users() {
    let ctx = TestContext::new().await;
    let (root, admin) = ctx.create_admin("root").await;
    let (alice, alice_token) = ctx.create_user("alice").await;

    AxumTestRequest::post(&format!("/api/admin/users/{}/active", root.id))
        .bearer(&admin)
        .json(&json!({ "is_active": false }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    AxumTestRequest::post(&format!("/api/admin/users/{}/active", alice.id))
        .bearer(&admin)
        .json(&json!({ "is_active": false }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);
    let body: Value = AxumTestRequest::get("/api/auth/me")
        .bearer(&alice_token)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::FORBIDDEN)
        .json();
    assert_eq!(body["error"]["code"], "ACCOUNT_DISABLED");

    AxumTestRequest::post(&format!("/api/admin/users/{}/active", alice.id))
        .bearer(&admin)
        .json(&json!({ "is_active": true }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);
    AxumTestRequest::get("/api/auth/me")
        .bearer(&alice_token)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);

    AxumTestRequest::delete(&format!("/api/admin/users/{}", root.id))
        .bearer(&admin)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    AxumTestRequest::delete(&format!("/api/admin/users/{}", alice.id))
        .bearer(&admin)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);
    AxumTestRequest::delete(&format!("/api/admin/users/{}", alice.id))
        .bearer(&admin)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::NOT_FOUND);
    AxumTestRequest::get("/api/auth/me")
        .bearer(&alice_token)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deleting_community_creator_keeps_community() {
    let ctx = TestContext::new().await;
    let (root, admin) = ctx.create_admin("root").await;
    let (owner_user, owner) = ctx.create_user("owner").await;
    let (_, bob) = ctx.create_user("bob").await;
    let community = ctx.simple_community(&owner, "Garden").await;
    let id = community["id"].as_i64().unwrap();
    ctx.join(&bob, community["join_code"].as_str().unwrap()).await;

    AxumTestRequest::post(&format!("/api/communities/{id}/posts"))
        .bearer(&bob)
        .json(&json!({ "content": "tomatoes are in" }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::CREATED);

    AxumTestRequest::delete(&format!("/api/admin/users/{}", owner_user.id))
        .bearer(&admin)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);

    let detail: Value = AxumTestRequest::get(&format!("/api/communities/{id}"))
        .bearer(&bob)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(detail["member_count"], 2);
    let stored = ctx
        .database()
        .communities()
        .get_community(id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.creator_id, root.id);
    assert_eq!(
        ctx.database()
            .communities()
            .get_membership_role(root.id, id)
            .await
            .unwrap()
            .as_deref(),
        Some("owner")
    );

    let feed: Value = AxumTestRequest::get(&format!("/api/communities/{id}/posts"))
        .bearer(&bob)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(feed["items"][0]["content"], "tomatoes are in");
}

#[tokio::test]
async fn test_deleting_group_creator_hands_group_over() {
    let ctx = TestContext::new().await;
    let (_, admin) = ctx.create_admin("root").await;
    let (alice_user, alice) = ctx.create_user("alice").await;
    let (bob_user, bob) = ctx.create_user("bob").await;
    let (_, carol) = ctx.create_user("carol").await;

    let created: Value = AxumTestRequest::post("/api/group-chats")
        .bearer(&alice)
        .json(&json!({ "name": "Trip", "members": ["bob", "carol"] }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::CREATED)
        .json();
    let group_id = created["group"]["id"].as_i64().unwrap();
    AxumTestRequest::post(&format!("/api/group-chats/{group_id}/messages"))
        .bearer(&bob)
        .json(&json!({ "message": "who books the train?" }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::CREATED);

    // a two-person group stays with the remaining member
    let solo: Value = AxumTestRequest::post("/api/group-chats")
        .bearer(&alice)
        .json(&json!({ "name": "Solo", "members": ["carol"] }))
        .send(ctx.app())
        .await
        .json();
    let solo_id = solo["group"]["id"].as_i64().unwrap();

    AxumTestRequest::delete(&format!("/api/admin/users/{}", alice_user.id))
        .bearer(&admin)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);

    let messages: Value = AxumTestRequest::get(&format!("/api/group-chats/{group_id}/messages"))
        .bearer(&bob)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(messages["messages"].as_array().unwrap().len(), 1);

    let chats = ctx.database().group_chats();
    let group = chats.get_group(group_id).await.unwrap().unwrap();
    assert_eq!(group.creator_id, bob_user.id);
    assert_eq!(
        chats.member_role(group_id, bob_user.id).await.unwrap().as_deref(),
        Some("admin")
    );

    AxumTestRequest::get(&format!("/api/group-chats/{solo_id}"))
        .bearer(&carol)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_broadcast_reaches_active_users() {
    let ctx = TestContext::new().await;
    let (_, admin) = ctx.create_admin("root").await;
    let (_, alice) = ctx.create_user("alice").await;
    let (bob, _) = ctx.create_user("bob").await;
    ctx.database().users().set_active(bob.id, false).await.unwrap();

    AxumTestRequest::post("/api/admin/broadcast")
        .bearer(&admin)
        .json(&json!({ "title": " ", "message": "" }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let sent: Value = AxumTestRequest::post("/api/admin/broadcast")
        .bearer(&admin)
        .json(&json!({
            "title": "Maintenance",
            "message": "Back at 5pm",
            "link": "/status",
        }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(sent["success"], true);
    assert_eq!(sent["notified"], 2);
    let notification_type = sent["notification_type"].as_str().unwrap();
    assert!(notification_type.starts_with("admin_broadcast:"));

    let inbox: Value = AxumTestRequest::get("/api/notifications")
        .bearer(&alice)
        .send(ctx.app())
        .await
        .json();
    let notification = &inbox["notifications"][0];
    assert_eq!(notification["type"], notification_type);
    assert_eq!(notification["message"], "Maintenance\n\nBack at 5pm");
    assert_eq!(notification["link"], "/status");
    assert_eq!(notification["from_user"], "root");
}

#[tokio::test]
async fn test_cron_key_is_enforced_when_configured() {
    let ctx = TestContext::with_config(|config| {
        config.reminders.cron_api_key = Some("s3cret".to_owned());
    })
    .await;

    for path in [
        "/api/cron/poll_notification_check",
        "/api/cron/event_notification_check",
    ] {
        AxumTestRequest::post(path)
            .send(ctx.app())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        AxumTestRequest::post(path)
            .header("x-api-key", "wrong")
            .send(ctx.app())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = AxumTestRequest::post(path)
            .header("x-api-key", "s3cret")
            .send(ctx.app())
            .await
            .assert_status(StatusCode::OK)
            .json();
        assert_eq!(body["success"], true);
        assert_eq!(body["notifications_sent"], 0);
    }
}

#[tokio::test]
async fn test_poll_reminders_reach_non_voters_once() {
    let ctx = TestContext::new().await;
    let (_, owner) = ctx.create_user("owner").await;
    let (_, bob) = ctx.create_user("bob").await;
    let (_, carol) = ctx.create_user("carol").await;
    let community = ctx.simple_community(&owner, "Club").await;
    let community_id = community["id"].as_i64().unwrap();
    let join_code = community["join_code"].as_str().unwrap();
    ctx.join(&bob, join_code).await;
    ctx.join(&carol, join_code).await;

    let create_poll = |question: &'static str| {
        AxumTestRequest::post(&format!("/api/communities/{community_id}/polls"))
            .bearer(&owner)
            .json(&json!({ "question": question, "options": ["Yes", "No"] }))
    };
    let poll: Value = create_poll("Picnic?")
        .send(ctx.app())
        .await
        .assert_status(StatusCode::CREATED)
        .json();
    let poll_id = poll["poll"]["id"].as_i64().unwrap();
    let option_id = poll["options"][0]["id"].as_i64().unwrap();
    AxumTestRequest::post(&format!("/api/polls/{poll_id}/vote"))
        .bearer(&bob)
        .json(&json!({ "option_id": option_id }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);

    let stale: Value = create_poll("Old question?").send(ctx.app()).await.json();
    let stale_id = stale["poll"]["id"].as_i64().unwrap();

    // 30 of 100 minutes elapsed puts the first poll in the quarter window
    let now = Utc::now();
    let pool = ctx.database().pool();
    sqlx::query("UPDATE polls SET created_at = $1, expires_at = $2 WHERE id = $3")
        .bind(stamp(now - Duration::minutes(30)))
        .bind(stamp(now + Duration::minutes(70)))
        .bind(poll_id)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("UPDATE polls SET created_at = $1, expires_at = $2 WHERE id = $3")
        .bind(stamp(now - Duration::days(2)))
        .bind(stamp(now - Duration::hours(1)))
        .bind(stale_id)
        .execute(pool)
        .await
        .unwrap();

    let run: Value = AxumTestRequest::post("/api/cron/poll_notification_check")
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(run["report"]["deactivated"], 1);
    assert_eq!(run["report"]["checked"], 1);
    assert_eq!(run["notifications_sent"], 2);

    assert!(notification_types(&ctx, &carol)
        .await
        .contains(&"poll_reminder".to_owned()));
    assert!(!notification_types(&ctx, &bob)
        .await
        .contains(&"poll_reminder".to_owned()));

    let rerun: Value = AxumTestRequest::post("/api/cron/poll_notification_check")
        .send(ctx.app())
        .await
        .json();
    assert_eq!(rerun["notifications_sent"], 0);

    let stale: Value = AxumTestRequest::get(&format!("/api/polls/{stale_id}"))
        .bearer(&owner)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(stale["poll"]["is_active"], false);
}

#[tokio::test]
async fn test_event_reminder_one_day_before() {
    let ctx = TestContext::new().await;
    let (_, alice) = ctx.create_user("alice").await;
    let (_, bob) = ctx.create_user("bob").await;
    ctx.create_user("carol").await;

    let starts = Utc::now() + Duration::hours(24);
    let event = |title: &'static str, preference: &'static str, invitee: &'static str| {
        json!({
            "title": title,
            "date": starts.format("%Y-%m-%d").to_string(),
            "start_time": starts.format("%H:%M").to_string(),
            "notification_preferences": preference,
            "usernames": [invitee],
        })
    };
    for body in [event("Standup", "all", "bob"), event("Quiet", "none", "carol")] {
        AxumTestRequest::post("/api/events")
            .bearer(&alice)
            .json(&body)
            .send(ctx.app())
            .await
            .assert_status(StatusCode::CREATED);
    }

    let run: Value = AxumTestRequest::post("/api/cron/event_notification_check")
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(run["notifications_sent"], 1);
    assert!(notification_types(&ctx, &bob)
        .await
        .contains(&"event_reminder".to_owned()));

    let rerun: Value = AxumTestRequest::post("/api/cron/event_notification_check")
        .send(ctx.app())
        .await
        .json();
    assert_eq!(rerun["notifications_sent"], 0);
}

async fn reminder_messages(ctx: &TestContext, token: &str) -> Vec<String> {
    let body: Value = AxumTestRequest::get("/api/notifications")
        .bearer(token)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    body["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["type"] == "event_reminder")
        .map(|n| n["message"].as_str().unwrap().to_owned())
        .collect()
}

fn event_at(title: &str, starts: DateTime<Utc>, preference: &str, invitee: &str) -> Value {
    json!({
        "title": title,
        "date": starts.format("%Y-%m-%d").to_string(),
        "start_time": starts.format("%H:%M").to_string(),
        "notification_preferences": preference,
        "usernames": [invitee],
    })
}

async fn create_event(ctx: &TestContext, token: &str, body: &Value) -> i64 {
    let created: Value = AxumTestRequest::post("/api/events")
        .bearer(token)
        .json(body)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::CREATED)
        .json();
    created["event"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_event_reminder_one_week_and_one_hour_windows() {
    let ctx = TestContext::new().await;
    let (_, alice) = ctx.create_user("alice").await;
    let (_, bob) = ctx.create_user("bob").await;
    let (_, carol) = ctx.create_user("carol").await;
    let (_, dave) = ctx.create_user("dave").await;

    let now = Utc::now();
    create_event(
        &ctx,
        &alice,
        &event_at("Retreat", now + Duration::hours(168), "1_week", "bob"),
    )
    .await;
    create_event(
        &ctx,
        &alice,
        &event_at("Call", now + Duration::minutes(60), "all", "carol"),
    )
    .await;
    // preference limited to another window
    create_event(
        &ctx,
        &alice,
        &event_at("Lunch", now + Duration::minutes(60), "1_day", "dave"),
    )
    .await;

    let run: Value = AxumTestRequest::post("/api/cron/event_notification_check")
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(run["report"]["checked"], 3);
    assert_eq!(run["notifications_sent"], 2);

    assert_eq!(
        reminder_messages(&ctx, &bob).await,
        vec!["📅 Event 'Retreat' in 1 week".to_owned()]
    );
    assert_eq!(
        reminder_messages(&ctx, &carol).await,
        vec!["⏰ Event 'Call' in 1 hour!".to_owned()]
    );
    assert!(reminder_messages(&ctx, &dave).await.is_empty());
}

#[tokio::test]
async fn test_event_progress_reminder_beyond_fixed_windows() {
    let ctx = TestContext::new().await;
    let (_, alice) = ctx.create_user("alice").await;
    let (_, bob) = ctx.create_user("bob").await;
    let (_, carol) = ctx.create_user("carol").await;

    let now = Utc::now();
    let offsite = create_event(
        &ctx,
        &alice,
        &event_at("Offsite", now + Duration::days(10), "all", "bob"),
    )
    .await;
    // a month out and freshly created: nothing to do yet, so not even examined
    create_event(
        &ctx,
        &alice,
        &event_at("Gala", now + Duration::days(30), "all", "carol"),
    )
    .await;

    sqlx::query("UPDATE calendar_events SET created_at = $1 WHERE id = $2")
        .bind(stamp(now - Duration::days(40)))
        .bind(offsite)
        .execute(ctx.database().pool())
        .await
        .unwrap();

    let run: Value = AxumTestRequest::post("/api/cron/event_notification_check")
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(run["report"]["checked"], 1);
    assert_eq!(run["notifications_sent"], 1);

    let messages = reminder_messages(&ctx, &bob).await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("📆 Event 'Offsite' in "));
    assert!(reminder_messages(&ctx, &carol).await.is_empty());

    let rerun: Value = AxumTestRequest::post("/api/cron/event_notification_check")
        .send(ctx.app())
        .await
        .json();
    assert_eq!(rerun["notifications_sent"], 0);
}
