// ABOUTME: HTTP integration tests for community feeds, replies, reactions and polls
// ABOUTME: Checks cursor pagination, moderation rights, reaction toggles and voting rules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;
mod helpers;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::TestContext;
use cpoint_core::models::{ReactionChange, ReactionTarget};
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};

struct Club {
    ctx: TestContext,
    id: i64,
    owner: String,
    bob: String,
    outsider: String,
}

async fn club() -> Club {
    let ctx = TestContext::new().await;
    let (_, owner) = ctx.create_user("owner").await;
    let (_, bob) = ctx.create_user("bob").await;
    let (_, outsider) = ctx.create_user("outsider").await;
    let community = ctx.simple_community(&owner, "Club").await;
    ctx.join(&bob, community["join_code"].as_str().unwrap()).await;
    let id = community["id"].as_i64().unwrap();
    Club {
        ctx,
        id,
        owner,
        bob,
        outsider,
    }
}

async fn create_post(club: &Club, token: &str, content: &str) -> Value {
    AxumTestRequest::post(&format!("/api/communities/{}/posts", club.id))
        .bearer(token)
        .json(&json!({ "content": content }))
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::CREATED)
        .json()
}

#[tokio::test]
async fn test_feed_pages_newest_first() {
    let club = club().await;
    for n in 1..=3 {
        create_post(&club, &club.owner, &format!("post {n}")).await;
    }

    let first: Value = AxumTestRequest::get(&format!("/api/communities/{}/posts?limit=2", club.id))
        .bearer(&club.bob)
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(first["items"][0]["content"], "post 3");
    assert_eq!(first["items"][1]["content"], "post 2");
    assert_eq!(first["has_more"], true);
    let cursor = first["next_cursor"].as_str().unwrap();

    let second: Value = AxumTestRequest::get(&format!(
        "/api/communities/{}/posts?limit=2&cursor={cursor}",
        club.id
    ))
    .bearer(&club.bob)
    .send(club.ctx.app())
    .await
    .assert_status(StatusCode::OK)
    .json();
    assert_eq!(second["items"].as_array().unwrap().len(), 1);
    assert_eq!(second["items"][0]["content"], "post 1");
    assert_eq!(second["has_more"], false);

    AxumTestRequest::get(&format!("/api/communities/{}/posts", club.id))
        .bearer(&club.outsider)
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::FORBIDDEN);

    AxumTestRequest::get(&format!("/api/communities/{}/posts?cursor=bm9wZQ", club.id))
        .bearer(&club.bob)
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_requires_text_or_image_and_notifies_members() {
    let club = club().await;

    AxumTestRequest::post(&format!("/api/communities/{}/posts", club.id))
        .bearer(&club.owner)
        .json(&json!({ "content": "   " }))
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    AxumTestRequest::post(&format!("/api/communities/{}/posts", club.id))
        .bearer(&club.outsider)
        .json(&json!({ "content": "hello" }))
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let post = create_post(&club, &club.owner, "Welcome!").await;

    let notifications: Value = AxumTestRequest::get("/api/notifications")
        .bearer(&club.bob)
        .send(club.ctx.app())
        .await
        .json();
    let notification = &notifications["notifications"][0];
    assert_eq!(notification["type"], "community_post");
    assert_eq!(notification["post_id"], post["id"]);
    assert_eq!(notification["link"], format!("/post/{}", post["id"]));
}

#[tokio::test]
async fn test_edit_and_delete_rights() {
    let club = club().await;
    let post = create_post(&club, &club.bob, "draft").await;
    let post_id = post["id"].as_i64().unwrap();

    AxumTestRequest::put(&format!("/api/posts/{post_id}"))
        .bearer(&club.owner)
        .json(&json!({ "content": "hijacked" }))
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let edited: Value = AxumTestRequest::put(&format!("/api/posts/{post_id}"))
        .bearer(&club.bob)
        .json(&json!({ "content": "final" }))
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(edited["content"], "final");
    assert!(!edited["edited_at"].is_null());

    // the community owner moderates other people's posts
    AxumTestRequest::delete(&format!("/api/posts/{post_id}"))
        .bearer(&club.owner)
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::OK);
    AxumTestRequest::get(&format!("/api/posts/{post_id}"))
        .bearer(&club.bob)
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let owner_post = create_post(&club, &club.owner, "announcement").await;
    AxumTestRequest::delete(&format!("/api/posts/{}", owner_post["id"]))
        .bearer(&club.bob)
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_replies_and_detail() {
    let club = club().await;
    let post = create_post(&club, &club.owner, "question?").await;
    let post_id = post["id"].as_i64().unwrap();

    let reply: Value = AxumTestRequest::post(&format!("/api/posts/{post_id}/replies"))
        .bearer(&club.bob)
        .json(&json!({ "content": "answer" }))
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::CREATED)
        .json();
    assert_eq!(reply["author_username"], "bob");

    let detail: Value = AxumTestRequest::get(&format!("/api/posts/{post_id}"))
        .bearer(&club.owner)
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(detail["post"]["content"], "question?");
    assert_eq!(detail["replies"][0]["content"], "answer");

    let notifications: Value = AxumTestRequest::get("/api/notifications")
        .bearer(&club.owner)
        .send(club.ctx.app())
        .await
        .json();
    assert!(notifications["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["type"] == "reply" && n["from_user"] == "bob"));

    AxumTestRequest::delete(&format!("/api/replies/{}", reply["id"]))
        .bearer(&club.bob)
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::OK);
    AxumTestRequest::delete(&format!("/api/replies/{}", reply["id"]))
        .bearer(&club.bob)
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reaction_toggle() {
    let club = club().await;
    let post = create_post(&club, &club.owner, "react to me").await;
    let url = format!("/api/posts/{}/reactions", post["id"]);

    let added: Value = AxumTestRequest::post(&url)
        .bearer(&club.bob)
        .json(&json!({ "reaction_type": "Like" }))
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(added["change"], "added");
    assert_eq!(added["reactions"]["counts"]["like"], 1);
    assert_eq!(added["reactions"]["user_reaction"], "like");

    let replaced: Value = AxumTestRequest::post(&url)
        .bearer(&club.bob)
        .json(&json!({ "reaction_type": "fire" }))
        .send(club.ctx.app())
        .await
        .json();
    assert_eq!(replaced["change"], "replaced");
    assert_eq!(replaced["reactions"]["counts"]["fire"], 1);
    assert!(replaced["reactions"]["counts"].get("like").is_none());

    let removed: Value = AxumTestRequest::post(&url)
        .bearer(&club.bob)
        .json(&json!({ "reaction_type": "fire" }))
        .send(club.ctx.app())
        .await
        .json();
    assert_eq!(removed["change"], "removed");
    assert!(removed["reactions"]["user_reaction"].is_null());

    AxumTestRequest::post(&url)
        .bearer(&club.bob)
        .json(&json!({ "reaction_type": "no spaces!" }))
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let notifications: Value = AxumTestRequest::get("/api/notifications")
        .bearer(&club.owner)
        .send(club.ctx.app())
        .await
        .json();
    let reactions: Vec<&Value> = notifications["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["type"] == "reaction")
        .collect();
    // repeated reactions from one user collapse into one notification
    assert_eq!(reactions.len(), 1);
}

#[tokio::test]
async fn test_poll_lifecycle() {
    let club = club().await;

    let poll: Value = AxumTestRequest::post(&format!("/api/communities/{}/polls", club.id))
        .bearer(&club.owner)
        .json(&json!({
            "question": "Where next?",
            "options": [" Park ", "Beach", ""],
        }))
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::CREATED)
        .json();
    let poll_id = poll["poll"]["id"].as_i64().unwrap();
    assert_eq!(poll["poll"]["single_vote"], true);
    let options = poll["options"].as_array().unwrap();
    assert_eq!(options.len(), 2);
    assert_eq!(options[0]["text"], "Park");
    let park = options[0]["id"].as_i64().unwrap();
    let beach = options[1]["id"].as_i64().unwrap();

    AxumTestRequest::post(&format!("/api/polls/{poll_id}/vote"))
        .bearer(&club.bob)
        .json(&json!({ "option_id": park }))
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::OK);
    // single-vote polls move the vote
    let results: Value = AxumTestRequest::post(&format!("/api/polls/{poll_id}/vote"))
        .bearer(&club.bob)
        .json(&json!({ "option_id": beach }))
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(results["user_votes"], json!([beach]));
    assert_eq!(results["total_voters"], 1);

    AxumTestRequest::post(&format!("/api/polls/{poll_id}/vote"))
        .bearer(&club.bob)
        .json(&json!({ "option_id": 99_999 }))
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::NOT_FOUND);

    AxumTestRequest::post(&format!("/api/polls/{poll_id}/close"))
        .bearer(&club.bob)
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::FORBIDDEN);
    let closed: Value = AxumTestRequest::post(&format!("/api/polls/{poll_id}/close"))
        .bearer(&club.owner)
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(closed["poll"]["is_active"], false);

    AxumTestRequest::post(&format!("/api/polls/{poll_id}/vote"))
        .bearer(&club.bob)
        .json(&json!({ "option_id": park }))
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let list: Value = AxumTestRequest::get(&format!("/api/communities/{}/polls", club.id))
        .bearer(&club.bob)
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(list["polls"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_multi_vote_poll_toggles_options() {
    let club = club().await;
    let poll: Value = AxumTestRequest::post(&format!("/api/communities/{}/polls", club.id))
        .bearer(&club.owner)
        .json(&json!({
            "question": "Which days?",
            "options": ["Mon", "Wed", "Fri"],
            "single_vote": false,
        }))
        .send(club.ctx.app())
        .await
        .json();
    let poll_id = poll["poll"]["id"].as_i64().unwrap();
    let mon = poll["options"][0]["id"].as_i64().unwrap();
    let fri = poll["options"][2]["id"].as_i64().unwrap();
    let vote = |option: i64| {
        AxumTestRequest::post(&format!("/api/polls/{poll_id}/vote"))
            .bearer(&club.bob)
            .json(&json!({ "option_id": option }))
    };

    vote(mon).send(club.ctx.app()).await;
    let results: Value = vote(fri).send(club.ctx.app()).await.json();
    assert_eq!(results["user_votes"].as_array().unwrap().len(), 2);
    assert_eq!(results["total_voters"], 1);

    let results: Value = vote(mon).send(club.ctx.app()).await.json();
    assert_eq!(results["user_votes"], json!([fri]));
}

#[tokio::test]
async fn test_poll_validation() {
    let club = club().await;
    let url = format!("/api/communities/{}/polls", club.id);
    let past = (Utc::now() - Duration::hours(1)).to_rfc3339();

    for body in [
        json!({ "options": ["a", "b"] }),
        json!({ "question": "q", "options": ["only one"] }),
        json!({ "question": "q", "options": (1..=11).map(|n| n.to_string()).collect::<Vec<_>>() }),
        json!({ "question": "q", "options": ["a", "b"], "expires_at": past }),
    ] {
        AxumTestRequest::post(&url)
            .bearer(&club.owner)
            .json(&body)
            .send(club.ctx.app())
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_failed_poll_creation_leaves_no_post() {
    let club = club().await;
    sqlx::query("DROP TABLE poll_options")
        .execute(club.ctx.database().pool())
        .await
        .unwrap();

    AxumTestRequest::post(&format!("/api/communities/{}/polls", club.id))
        .bearer(&club.owner)
        .json(&json!({ "question": "Where next?", "options": ["Park", "Beach"] }))
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let feed: Value = AxumTestRequest::get(&format!("/api/communities/{}/posts", club.id))
        .bearer(&club.bob)
        .send(club.ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert!(feed["items"].as_array().unwrap().is_empty());
    let polls: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM polls")
        .fetch_one(club.ctx.database().pool())
        .await
        .unwrap();
    assert_eq!(polls, 0);
}

#[tokio::test]
async fn test_concurrent_reaction_toggles_stay_consistent() {
    let club = club().await;
    let post = create_post(&club, &club.owner, "race me").await;
    let post_id = post["id"].as_i64().unwrap();
    let (erin, _) = club.ctx.create_user("erin").await;
    let posts = club.ctx.database().posts();
    let target = ReactionTarget::Post(post_id);

    let (a, b, c, d) = tokio::join!(
        posts.react(target, erin.id, "like"),
        posts.react(target, erin.id, "like"),
        posts.react(target, erin.id, "fire"),
        posts.react(target, erin.id, "like"),
    );
    let changes = [a.unwrap(), b.unwrap(), c.unwrap(), d.unwrap()];
    let count = |kind: ReactionChange| changes.iter().filter(|c| **c == kind).count() as i64;

    let summary = posts.reaction_summary(target, erin.id).await.unwrap();
    assert!(summary.total() <= 1);
    assert_eq!(
        count(ReactionChange::Added) - count(ReactionChange::Removed),
        summary.total()
    );
    assert_eq!(summary.total() == 1, summary.user_reaction.is_some());
}
