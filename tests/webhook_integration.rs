// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Integration tests for webhook handling.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::create_test_app;

async fn post_event(event: serde_json::Value) -> StatusCode {
    let (app, _) = create_test_app();

    app.oneshot(
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&event).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap()
    .status()
}

#[tokio::test]
async fn test_webhook_verification() {
    let (app, _) = create_test_app();

    let challenge = "test_challenge_123";
    let verify_token = "test_verify_token"; // Matches Config::test_default()

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!(
                    "/webhook?hub.mode=subscribe&hub.challenge={}&hub.verify_token={}",
                    challenge, verify_token
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["hub.challenge"], challenge);
}

#[tokio::test]
async fn test_webhook_verification_wrong_token() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/webhook?hub.mode=subscribe&hub.challenge=abc&hub.verify_token=wrong_token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = axum::body::to_bytes(response.into_body(), 1024)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["hub.challenge"], "");
}

#[tokio::test]
async fn test_webhook_verification_wrong_mode() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(
                    "/webhook?hub.mode=unsubscribe&hub.challenge=abc\
                     &hub.verify_token=test_verify_token",
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_webhook_event_create_activity() {
    // Background annotation fails against the offline database; the
    // response must not wait for it.
    let status = post_event(json!({
        "aspect_type": "create",
        "event_time": 1234567890,
        "object_id": 12345678901_u64,
        "object_type": "activity",
        "owner_id": 123456,
        "subscription_id": 12345
    }))
    .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_event_update_activity() {
    let status = post_event(json!({
        "aspect_type": "update",
        "event_time": 1234567890,
        "object_id": 12345678901_u64,
        "object_type": "activity",
        "owner_id": 123456,
        "subscription_id": 12345,
        "updates": {"title": "New Title"}
    }))
    .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_event_athlete_deauthorize() {
    let status = post_event(json!({
        "aspect_type": "update",
        "event_time": 1234567890,
        "object_id": 123456,
        "object_type": "athlete",
        "owner_id": 123456,
        "subscription_id": 12345,
        "updates": {"authorized": "false"}
    }))
    .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_event_malformed_payload() {
    let status = post_event(json!({
        "object_type": "activity",
        "object_id": "not-a-number"
    }))
    .await;

    // Strava retries anything but 200.
    assert_eq!(status, StatusCode::OK);
}
