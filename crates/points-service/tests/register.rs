//! Registration integration tests.

mod common;

use axum::http::StatusCode;
use common::{user_id_of, TestHarness};
use serde_json::json;

#[tokio::test]
async fn register_returns_user_with_referral_code() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/register")
        .json(&json!({ "name": "Ada", "email": "ada@example.com" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["user"]["name"], "Ada");
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["user"]["referral_code"].as_str().unwrap().len(), 6);
    assert_eq!(body["points"], 0);
    assert!(body["referrer_id"].is_null());
    assert_eq!(body["referral_bonus"]["status"], "not_triggered");
}

#[tokio::test]
async fn register_creates_zero_balance() {
    let harness = TestHarness::new();

    let user = harness.register(None).await;

    assert_eq!(harness.balance(&user).await, 0);
}

#[tokio::test]
async fn register_without_name_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/register")
        .json(&json!({ "email": "ada@example.com" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn register_without_email_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/register")
        .json(&json!({ "name": "Ada", "email": "  " }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_with_malformed_json_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/register")
        .content_type("application/json")
        .text("{not json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_with_unknown_referral_code_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/register")
        .json(&json!({
            "name": "Ada",
            "email": "ada@example.com",
            "referral_code": "zzzzzz"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(harness.store().snapshot().await.users.is_empty());
}

#[tokio::test]
async fn register_with_referral_code_links_referrer() {
    let harness = TestHarness::new();
    let referrer = harness.register(None).await;
    let code = referrer["referral_code"].as_str().unwrap();

    let response = harness
        .server
        .post("/register")
        .json(&json!({
            "name": "Friend",
            "email": "friend@example.com",
            "referral_code": code
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["referrer_id"], referrer["id"]);
    assert_eq!(body["referral_bonus"]["status"], "pending");
    assert_eq!(body["referral_bonus"]["unpaid"], 1);
}

#[tokio::test]
async fn third_referral_pays_referrer() {
    let harness = TestHarness::new();
    let u1 = harness.register(None).await;
    let code = u1["referral_code"].as_str().unwrap();

    harness.register(Some(code)).await;
    harness.register(Some(code)).await;
    harness.register(Some(code)).await;

    assert_eq!(harness.balance(&u1).await, 50);

    let state = harness.store().snapshot().await;
    let links: Vec<_> = state
        .referrals
        .iter()
        .filter(|link| link.referrer_id == user_id_of(&u1))
        .collect();
    assert_eq!(links.len(), 3);
    assert!(links.iter().all(|link| link.paid_out));
}
