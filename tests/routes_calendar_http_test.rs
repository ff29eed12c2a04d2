// ABOUTME: HTTP integration tests for calendar events, invitations and RSVPs
// ABOUTME: Checks visibility rules, organizer rights, invitation notifications and date validation
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

async fn create_event(ctx: &TestContext, token: &str, body: Value) -> Value {
    AxumTestRequest::post("/api/events")
        .bearer(token)
        .json(&body)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::CREATED)
        .json()
}

#[tokio::test]
async fn test_personal_event_with_invitations() {
    let ctx = TestContext::new().await;
    let (_, alice) = ctx.create_user("alice").await;
    let (_, bob) = ctx.create_user("bob").await;
    let (_, carol) = ctx.create_user("carol").await;

    let created = create_event(
        &ctx,
        &alice,
        json!({
            "title": "Dinner",
            "date": "2030-05-01",
            "start_time": "19:30",
            "location": " Home ",
            "usernames": ["Bob", "alice"],
        }),
    )
    .await;
    let event_id = created["event"]["id"].as_i64().unwrap();
    assert_eq!(created["event"]["date"], "2030-05-01");
    assert_eq!(created["event"]["location"], "Home");
    assert_eq!(created["event"]["notification_preferences"], "all");
    assert_eq!(created["invited"], json!(["bob"]));

    let notifications: Value = AxumTestRequest::get("/api/notifications")
        .bearer(&bob)
        .send(ctx.app())
        .await
        .json();
    let notification = &notifications["notifications"][0];
    assert_eq!(notification["type"], "event_invitation");
    assert_eq!(notification["link"], format!("/event/{event_id}"));

    // invitees see it, strangers do not
    AxumTestRequest::get(&format!("/api/events/{event_id}"))
        .bearer(&bob)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);
    AxumTestRequest::get(&format!("/api/events/{event_id}"))
        .bearer(&carol)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let listed: Value = AxumTestRequest::get("/api/events?from=2030-01-01&to=2030-12-31")
        .bearer(&bob)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(listed["events"].as_array().unwrap().len(), 1);
    let outside: Value = AxumTestRequest::get("/api/events?from=2031-01-01")
        .bearer(&bob)
        .send(ctx.app())
        .await
        .json();
    assert!(outside["events"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rsvp_counts() {
    let ctx = TestContext::new().await;
    let (_, alice) = ctx.create_user("alice").await;
    let (_, bob) = ctx.create_user("bob").await;
    let created = create_event(
        &ctx,
        &alice,
        json!({ "title": "Party", "date": "2030-06-01", "usernames": ["bob"] }),
    )
    .await;
    let url = format!("/api/events/{}/rsvp", created["event"]["id"]);

    let details: Value = AxumTestRequest::post(&url)
        .bearer(&bob)
        .json(&json!({ "status": "going" }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(details["rsvp_counts"]["going"], 1);
    assert_eq!(details["user_rsvp"], "going");

    let details: Value = AxumTestRequest::post(&url)
        .bearer(&bob)
        .json(&json!({ "status": "maybe" }))
        .send(ctx.app())
        .await
        .json();
    assert_eq!(details["rsvp_counts"]["going"], 0);
    assert_eq!(details["rsvp_counts"]["maybe"], 1);

    AxumTestRequest::post(&url)
        .bearer(&bob)
        .json(&json!({ "status": "perhaps" }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_community_event_visibility_and_organizer_rights() {
    let ctx = TestContext::new().await;
    let (_, owner) = ctx.create_user("owner").await;
    let (_, bob) = ctx.create_user("bob").await;
    let (_, outsider) = ctx.create_user("outsider").await;
    let community = ctx.simple_community(&owner, "Club").await;
    let community_id = community["id"].as_i64().unwrap();
    ctx.join(&bob, community["join_code"].as_str().unwrap()).await;

    AxumTestRequest::post("/api/events")
        .bearer(&outsider)
        .json(&json!({ "title": "Crash", "date": "2030-01-01", "community_id": community_id }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let created = create_event(
        &ctx,
        &bob,
        json!({
            "title": "Meetup",
            "date": "2030-03-03",
            "community_id": community_id,
            "all_members": true,
        }),
    )
    .await;
    let event_id = created["event"]["id"].as_i64().unwrap();
    assert_eq!(created["invited"], json!(["owner"]));

    let listed: Value = AxumTestRequest::get(&format!("/api/events?community_id={community_id}"))
        .bearer(&owner)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(listed["events"][0]["title"], "Meetup");

    // community admins may edit member events
    let updated: Value = AxumTestRequest::put(&format!("/api/events/{event_id}"))
        .bearer(&owner)
        .json(&json!({ "title": "Meetup (moved)", "date": "2030-03-04" }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(updated["event"]["title"], "Meetup (moved)");
    assert_eq!(updated["event"]["date"], "2030-03-04");

    AxumTestRequest::delete(&format!("/api/events/{event_id}"))
        .bearer(&outsider)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::FORBIDDEN);
    AxumTestRequest::delete(&format!("/api/events/{event_id}"))
        .bearer(&bob)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);
    AxumTestRequest::get(&format!("/api/events/{event_id}"))
        .bearer(&bob)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_event_validation() {
    let ctx = TestContext::new().await;
    let (_, alice) = ctx.create_user("alice").await;

    for body in [
        json!({ "date": "2030-01-01" }),
        json!({ "title": "No date" }),
        json!({ "title": "Bad date", "date": "01/02/2030" }),
        json!({ "title": "Bad time", "date": "2030-01-01", "start_time": "7pm" }),
        json!({ "title": "Backwards", "date": "2030-01-05", "end_date": "2030-01-04" }),
        json!({ "title": "Personal", "date": "2030-01-01", "all_members": true }),
    ] {
        AxumTestRequest::post("/api/events")
            .bearer(&alice)
            .json(&body)
            .send(ctx.app())
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    AxumTestRequest::post("/api/events")
        .bearer(&alice)
        .json(&json!({ "title": "Ghost guests", "date": "2030-01-01", "usernames": ["nobody"] }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invite_endpoint() {
    let ctx = TestContext::new().await;
    let (_, alice) = ctx.create_user("alice").await;
    let (_, bob) = ctx.create_user("bob").await;
    ctx.create_user("carol").await;
    let created = create_event(&ctx, &alice, json!({ "title": "Hike", "date": "2030-08-08" })).await;
    let url = format!("/api/events/{}/invite", created["event"]["id"]);

    AxumTestRequest::post(&url)
        .bearer(&alice)
        .json(&json!({}))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let invited: Value = AxumTestRequest::post(&url)
        .bearer(&alice)
        .json(&json!({ "usernames": ["bob", "carol"] }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(invited["invited"], 2);

    // re-inviting does not count twice
    let invited: Value = AxumTestRequest::post(&url)
        .bearer(&alice)
        .json(&json!({ "usernames": ["bob"] }))
        .send(ctx.app())
        .await
        .json();
    assert_eq!(invited["invited"], 0);

    AxumTestRequest::post(&url)
        .bearer(&bob)
        .json(&json!({ "usernames": ["carol"] }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::FORBIDDEN);
}
