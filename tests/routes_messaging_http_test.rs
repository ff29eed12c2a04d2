// ABOUTME: HTTP integration tests for direct messages and group chats
// ABOUTME: Covers threads, read state, unread badges, group caps and admin hand-over
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;
mod helpers;

use axum::http::StatusCode;
use common::TestContext;
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};

async fn send_dm(ctx: &TestContext, token: &str, to: &str, message: &str) -> Value {
    AxumTestRequest::post("/api/messages")
        .bearer(token)
        .json(&json!({ "receiver_username": to, "message": message }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::CREATED)
        .json()
}

#[tokio::test]
async fn test_direct_message_thread_and_read_state() {
    let ctx = TestContext::new().await;
    let (_, alice) = ctx.create_user("alice").await;
    let (_, bob) = ctx.create_user("bob").await;

    send_dm(&ctx, &alice, "bob", "hi bob").await;
    send_dm(&ctx, &alice, "bob", "are you there?").await;

    let unread: Value = AxumTestRequest::get("/api/messages/unread-count")
        .bearer(&bob)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(unread["unread_count"], 2);

    let conversations: Value = AxumTestRequest::get("/api/messages/conversations")
        .bearer(&bob)
        .send(ctx.app())
        .await
        .json();
    let conversation = &conversations["conversations"][0];
    assert_eq!(conversation["partner_username"], "alice");
    assert_eq!(conversation["unread_count"], 2);
    assert_eq!(conversation["last_message"]["message"], "are you there?");

    let thread: Value = AxumTestRequest::get("/api/messages/with/alice")
        .bearer(&bob)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    let messages = thread["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["message"], "hi bob");

    let unread: Value = AxumTestRequest::get("/api/messages/unread-count")
        .bearer(&bob)
        .send(ctx.app())
        .await
        .json();
    assert_eq!(unread["unread_count"], 0);
}

#[tokio::test]
async fn test_thread_pages_backwards() {
    let ctx = TestContext::new().await;
    let (_, alice) = ctx.create_user("alice").await;
    ctx.create_user("bob").await;

    let mut ids = Vec::new();
    for n in 1..=5 {
        let sent = send_dm(&ctx, &alice, "bob", &format!("m{n}")).await;
        ids.push(sent["id"].as_i64().unwrap());
    }

    let latest: Value = AxumTestRequest::get("/api/messages/with/bob?limit=2")
        .bearer(&alice)
        .send(ctx.app())
        .await
        .json();
    let texts: Vec<&str> = latest["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["m4", "m5"]);

    let older: Value = AxumTestRequest::get(&format!(
        "/api/messages/with/bob?limit=2&before_id={}",
        ids[3]
    ))
    .bearer(&alice)
    .send(ctx.app())
    .await
    .json();
    let texts: Vec<&str> = older["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["m2", "m3"]);
}

#[tokio::test]
async fn test_direct_message_rules() {
    let ctx = TestContext::new().await;
    let (_, alice) = ctx.create_user("alice").await;
    let (_, bob) = ctx.create_user("bob").await;

    AxumTestRequest::post("/api/messages")
        .bearer(&alice)
        .json(&json!({ "receiver_username": "alice", "message": "me" }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    AxumTestRequest::post("/api/messages")
        .bearer(&alice)
        .json(&json!({ "receiver_username": "ghost", "message": "boo" }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::NOT_FOUND);

    AxumTestRequest::post("/api/messages")
        .bearer(&alice)
        .json(&json!({ "receiver_username": "bob" }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let sent = send_dm(&ctx, &alice, "bob", "oops").await;
    AxumTestRequest::delete(&format!("/api/messages/{}", sent["id"]))
        .bearer(&bob)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::NOT_FOUND);
    AxumTestRequest::delete(&format!("/api/messages/{}", sent["id"]))
        .bearer(&alice)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_badge_combines_notifications_and_messages() {
    let ctx = TestContext::new().await;
    let (_, alice) = ctx.create_user("alice").await;
    let (_, bob) = ctx.create_user("bob").await;
    let community = ctx.simple_community(&bob, "Club").await;
    ctx.join(&alice, community["join_code"].as_str().unwrap()).await;
    send_dm(&ctx, &alice, "bob", "hello").await;

    let badge: Value = AxumTestRequest::get("/api/notifications/badge")
        .bearer(&bob)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(badge["notifications"], 1);
    assert_eq!(badge["messages"], 1);
    assert_eq!(badge["total"], 2);
}

#[tokio::test]
async fn test_group_chat_lifecycle() {
    let ctx = TestContext::new().await;
    let (_, alice) = ctx.create_user("alice").await;
    let (_, bob) = ctx.create_user("bob").await;
    let (_, carol) = ctx.create_user("carol").await;
    let (_, outsider) = ctx.create_user("outsider").await;

    let created: Value = AxumTestRequest::post("/api/group-chats")
        .bearer(&alice)
        .json(&json!({ "name": "Trip", "members": ["Bob", "bob", "alice"] }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::CREATED)
        .json();
    let group_id = created["group"]["id"].as_i64().unwrap();
    assert_eq!(created["members"].as_array().unwrap().len(), 2);

    AxumTestRequest::post(&format!("/api/group-chats/{group_id}/messages"))
        .bearer(&bob)
        .json(&json!({ "message": "hello all" }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::CREATED);

    let groups: Value = AxumTestRequest::get("/api/group-chats")
        .bearer(&alice)
        .send(ctx.app())
        .await
        .json();
    assert_eq!(groups["groups"][0]["unread_count"], 1);
    assert_eq!(groups["groups"][0]["last_message"]["message"], "hello all");

    let messages: Value = AxumTestRequest::get(&format!("/api/group-chats/{group_id}/messages"))
        .bearer(&alice)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(messages["messages"].as_array().unwrap().len(), 1);
    let groups: Value = AxumTestRequest::get("/api/group-chats")
        .bearer(&alice)
        .send(ctx.app())
        .await
        .json();
    assert_eq!(groups["groups"][0]["unread_count"], 0);

    AxumTestRequest::get(&format!("/api/group-chats/{group_id}"))
        .bearer(&outsider)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::NOT_FOUND);
    AxumTestRequest::post(&format!("/api/group-chats/{group_id}/messages"))
        .bearer(&outsider)
        .json(&json!({ "message": "let me in" }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // only the admin adds people
    AxumTestRequest::post(&format!("/api/group-chats/{group_id}/members"))
        .bearer(&bob)
        .json(&json!({ "usernames": ["carol"] }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::FORBIDDEN);
    let added: Value = AxumTestRequest::post(&format!("/api/group-chats/{group_id}/members"))
        .bearer(&alice)
        .json(&json!({ "usernames": ["carol"] }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(added["added"], 1);

    // the creator leaving hands admin to someone else
    let left: Value = AxumTestRequest::post(&format!("/api/group-chats/{group_id}/leave"))
        .bearer(&alice)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(left["group_closed"], false);
    assert!(!left["new_admin_id"].is_null());

    for token in [&bob, &carol] {
        AxumTestRequest::post(&format!("/api/group-chats/{group_id}/leave"))
            .bearer(token)
            .send(ctx.app())
            .await
            .assert_status(StatusCode::OK);
    }
    AxumTestRequest::get(&format!("/api/group-chats/{group_id}"))
        .bearer(&bob)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_group_chat_size_limits() {
    let ctx = TestContext::new().await;
    let (_, alice) = ctx.create_user("alice").await;
    let mut names = Vec::new();
    for n in 1..=6 {
        let name = format!("friend{n}");
        ctx.create_user(&name).await;
        names.push(name);
    }

    AxumTestRequest::post("/api/group-chats")
        .bearer(&alice)
        .json(&json!({ "name": "Too big", "members": names }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    AxumTestRequest::post("/api/group-chats")
        .bearer(&alice)
        .json(&json!({ "name": "Empty", "members": [] }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    AxumTestRequest::post("/api/group-chats")
        .bearer(&alice)
        .json(&json!({ "name": "Ghosts", "members": ["nobody"] }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let created: Value = AxumTestRequest::post("/api/group-chats")
        .bearer(&alice)
        .json(&json!({ "name": "Full", "members": &names[..5] }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::CREATED)
        .json();
    let group_id = created["group"]["id"].as_i64().unwrap();

    AxumTestRequest::post(&format!("/api/group-chats/{group_id}/members"))
        .bearer(&alice)
        .json(&json!({ "usernames": ["friend6"] }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::FORBIDDEN);
}
