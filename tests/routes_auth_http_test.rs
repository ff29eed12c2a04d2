// ABOUTME: HTTP integration tests for signup, email verification, login and sessions
// ABOUTME: Exercises the auth routes through the full router with an in-memory database
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;
mod helpers;

use axum::http::StatusCode;
use common::{TestContext, TEST_PASSWORD};
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};

fn verification_token(email_text: &str) -> String {
    let start = email_text
        .find("token=")
        .expect("verification link in email")
        + "token=".len();
    email_text[start..]
        .split_whitespace()
        .next()
        .expect("token value")
        .to_owned()
}

fn cookie_value(set_cookies: &[String], name: &str) -> Option<String> {
    set_cookies.iter().find_map(|cookie| {
        cookie
            .split(';')
            .next()
            .and_then(|pair| pair.strip_prefix(&format!("{name}=")))
            .map(str::to_owned)
    })
}

async fn signup(ctx: &TestContext, body: &Value) -> helpers::axum_test::AxumTestResponse {
    AxumTestRequest::post("/api/auth/signup")
        .json(body)
        .send(ctx.app())
        .await
}

fn signup_body(email: &str) -> Value {
    json!({
        "email": email,
        "password": "secret123",
        "confirm_password": "secret123",
        "first_name": "Ada",
        "last_name": "Lovelace",
    })
}

#[tokio::test]
async fn test_signup_requires_email_verification() {
    let ctx = TestContext::new().await;

    let body: Value = signup(&ctx, &signup_body("Ada@Example.com"))
        .await
        .assert_status(StatusCode::CREATED)
        .json();
    assert_eq!(body["verification_required"], true);
    assert_eq!(body["email"], "ada@example.com");

    // no account exists until the link is followed
    let login = AxumTestRequest::post("/api/auth/login")
        .json(&json!({ "username": "ada@example.com", "password": "secret123" }))
        .send(ctx.app())
        .await;
    assert_eq!(login.status(), 401);

    let email = ctx.mailer.last_to("ada@example.com").expect("email sent");
    assert!(email.text.contains("http://localhost:8081/verify-email?token="));
}

#[tokio::test]
async fn test_verify_email_creates_account_and_session() {
    let ctx = TestContext::new().await;
    signup(&ctx, &signup_body("ada@example.com"))
        .await
        .assert_status(StatusCode::CREATED);
    let token = verification_token(&ctx.mailer.last_to("ada@example.com").unwrap().text);

    let response = AxumTestRequest::post("/api/auth/verify-email")
        .json(&json!({ "token": token }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);
    let cookies = response.header_values("set-cookie");
    assert!(cookie_value(&cookies, "auth_token").is_some());
    assert!(cookie_value(&cookies, "remember_token").is_some());

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["username"], "ada");
    assert_eq!(body["user"]["email_verified"], true);
    assert!(body["user"].get("password_hash").is_none());

    // the token cannot be replayed once the pending signup is promoted
    AxumTestRequest::post("/api/auth/verify-email")
        .json(&json!({ "token": token }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_signup_rejects_bad_input() {
    let ctx = TestContext::new().await;

    let mut mismatch = signup_body("a@example.com");
    mismatch["confirm_password"] = json!("different");
    signup(&ctx, &mismatch)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let mut short = signup_body("a@example.com");
    short["password"] = json!("abc");
    short["confirm_password"] = json!("abc");
    signup(&ctx, &short).await.assert_status(StatusCode::BAD_REQUEST);

    signup(&ctx, &signup_body("not-an-email"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let mut missing_name = signup_body("a@example.com");
    missing_name["first_name"] = json!("  ");
    signup(&ctx, &missing_name)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_rejects_taken_email_and_username() {
    let ctx = TestContext::new().await;
    ctx.create_user("grace").await;

    signup(&ctx, &signup_body("grace@example.com"))
        .await
        .assert_status(StatusCode::CONFLICT);

    let mut taken = signup_body("other@example.com");
    taken["username"] = json!("grace");
    signup(&ctx, &taken).await.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_with_username_or_email() {
    let ctx = TestContext::new().await;
    ctx.create_user("alice").await;

    for identifier in ["alice", "alice@example.com"] {
        let body: Value = AxumTestRequest::post("/api/auth/login")
            .json(&json!({ "username": identifier, "password": TEST_PASSWORD }))
            .send(ctx.app())
            .await
            .assert_status(StatusCode::OK)
            .json();
        assert_eq!(body["user"]["username"], "alice");
        assert!(body["expires_in"].as_i64().unwrap() > 0);
    }

    AxumTestRequest::post("/api/auth/login")
        .json(&json!({ "username": "alice", "password": "wrong-password" }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    AxumTestRequest::post("/api/auth/login")
        .json(&json!({ "password": TEST_PASSWORD }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_without_remember_skips_remember_cookie() {
    let ctx = TestContext::new().await;
    ctx.create_user("alice").await;

    let response = AxumTestRequest::post("/api/auth/login")
        .json(&json!({ "username": "alice", "password": TEST_PASSWORD, "remember": false }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);
    let cookies = response.header_values("set-cookie");
    assert!(cookie_value(&cookies, "auth_token").is_some());
    assert!(cookie_value(&cookies, "remember_token").is_none());
}

#[tokio::test]
async fn test_login_purges_expired_remember_tokens() {
    let ctx = TestContext::new().await;
    let (alice, _) = ctx.create_user("alice").await;
    let pool = ctx.database().pool();
    sqlx::query(
        "INSERT INTO remember_tokens (user_id, token_hash, created_at, expires_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(alice.id.to_string())
    .bind("stale-hash")
    .bind("2020-01-01T00:00:00.000Z")
    .bind("2020-01-31T00:00:00.000Z")
    .execute(pool)
    .await
    .unwrap();

    AxumTestRequest::post("/api/auth/login")
        .json(&json!({ "username": "alice", "password": TEST_PASSWORD }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);

    let stale: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM remember_tokens WHERE token_hash = 'stale-hash'")
            .fetch_one(pool)
            .await
            .unwrap();
    assert_eq!(stale, 0);
    let live: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM remember_tokens")
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(live, 1);
}

#[tokio::test]
async fn test_deactivated_account_cannot_log_in() {
    let ctx = TestContext::new().await;
    let (alice, _) = ctx.create_user("alice").await;
    ctx.database().users().set_active(alice.id, false).await.unwrap();

    AxumTestRequest::post("/api/auth/login")
        .json(&json!({ "username": "alice", "password": TEST_PASSWORD }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_me_accepts_bearer_and_cookie_sessions() {
    let ctx = TestContext::new().await;
    let (_, token) = ctx.create_user("alice").await;

    let me: Value = AxumTestRequest::get("/api/auth/me")
        .bearer(&token)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(me["username"], "alice");

    let me: Value = AxumTestRequest::get("/api/auth/me")
        .cookie("auth_token", &token)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(me["username"], "alice");

    AxumTestRequest::get("/api/auth/me")
        .send(ctx.app())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    AxumTestRequest::get("/api/auth/me")
        .bearer("not-a-jwt")
        .send(ctx.app())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_remember_cookie_restores_session() {
    let ctx = TestContext::new().await;
    ctx.create_user("alice").await;

    let response = AxumTestRequest::post("/api/auth/login")
        .json(&json!({ "username": "alice", "password": TEST_PASSWORD }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);
    let remember = cookie_value(&response.header_values("set-cookie"), "remember_token")
        .expect("remember cookie");

    let me: Value = AxumTestRequest::get("/api/auth/me")
        .cookie("remember_token", &remember)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    assert_eq!(me["username"], "alice");

    // logout revokes the remember token
    AxumTestRequest::post("/api/auth/logout")
        .cookie("remember_token", &remember)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);
    AxumTestRequest::get("/api/auth/me")
        .cookie("remember_token", &remember)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_change_password() {
    let ctx = TestContext::new().await;
    let (_, token) = ctx.create_user("alice").await;

    AxumTestRequest::post("/api/auth/change-password")
        .bearer(&token)
        .json(&json!({
            "current_password": "wrong",
            "new_password": "newsecret",
            "confirm_password": "newsecret",
        }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    AxumTestRequest::post("/api/auth/change-password")
        .bearer(&token)
        .json(&json!({
            "current_password": TEST_PASSWORD,
            "new_password": "newsecret",
            "confirm_password": "newsecret",
        }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);

    AxumTestRequest::post("/api/auth/login")
        .json(&json!({ "username": "alice", "password": "newsecret" }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_login_history_records_logins() {
    let ctx = TestContext::new().await;
    let (_, token) = ctx.create_user("alice").await;

    AxumTestRequest::post("/api/auth/login")
        .header("user-agent", "integration-test")
        .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
        .json(&json!({ "username": "alice", "password": TEST_PASSWORD }))
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK);

    let history: Value = AxumTestRequest::get("/api/auth/login-history")
        .bearer(&token)
        .send(ctx.app())
        .await
        .assert_status(StatusCode::OK)
        .json();
    let logins = history["logins"].as_array().unwrap();
    assert_eq!(logins.len(), 1);
    assert_eq!(logins[0]["ip_address"], "203.0.113.7");
}
