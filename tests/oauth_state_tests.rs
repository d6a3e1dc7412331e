// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth state checks on the provider callbacks.
//!
//! Every rejected state must bounce back to the frontend before any code
//! exchange is attempted, so none of these tests need network access.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use tower::ServiceExt;

mod common;
use common::{create_test_app, create_test_jwt};

async fn get(app: Router, uri: &str, cookie: Option<String>) -> Response {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .unwrap()
        .to_string()
}

/// Pull the `state` parameter out of an authorization redirect.
fn state_param(url: &str) -> String {
    url.split('&')
        .find_map(|pair| pair.strip_prefix("state="))
        .expect("authorization URL without state")
        .to_string()
}

#[tokio::test]
async fn test_strava_callback_rejects_garbage_state() {
    let (app, _) = create_test_app();

    let response = get(
        app,
        "/auth/strava/callback?code=abc&state=not-valid-base64!!!",
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "http://localhost:5173?error=invalid_state"
    );
}

#[tokio::test]
async fn test_strava_callback_rejects_unsigned_state() {
    let (app, _) = create_test_app();

    // Well-formed payload with a made-up signature.
    let forged = URL_SAFE_NO_PAD.encode(format!("strava||{:x}|{}", 1u64 << 40, "00".repeat(32)));
    let response = get(
        app,
        &format!("/auth/strava/callback?code=abc&state={}", forged),
        None,
    )
    .await;

    assert_eq!(
        location(&response),
        "http://localhost:5173?error=invalid_state"
    );
}

#[tokio::test]
async fn test_strava_callback_missing_state() {
    let (app, _) = create_test_app();

    let response = get(app, "/auth/strava/callback?code=abc", None).await;

    assert_eq!(
        location(&response),
        "http://localhost:5173?error=invalid_state"
    );
}

#[tokio::test]
async fn test_strava_callback_forwards_provider_error() {
    let (app, _) = create_test_app();

    let response = get(app, "/auth/strava/callback?error=access_denied", None).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response),
        "http://localhost:5173?error=access_denied"
    );
}

#[tokio::test]
async fn test_state_url_safe_encoding() {
    let (app, _) = create_test_app();

    let response = get(app, "/auth/strava", None).await;
    let state = state_param(&location(&response));

    assert!(!state.contains('+'), "State should not contain '+'");
    assert!(!state.contains('/'), "State should not contain '/'");
    assert!(!state.contains('='), "State should not contain '=' padding");
}

#[tokio::test]
async fn test_strava_state_is_not_accepted_by_spotify_callback() {
    let (app, _) = create_test_app();

    let response = get(app.clone(), "/auth/strava", None).await;
    let strava_state = state_param(&location(&response));

    let response = get(
        app,
        &format!("/auth/spotify/callback?code=abc&state={}", strava_state),
        None,
    )
    .await;

    assert_eq!(
        location(&response),
        "http://localhost:5173?error=invalid_state"
    );
}

#[tokio::test]
async fn test_spotify_state_is_not_accepted_by_strava_callback() {
    let (app, _) = create_test_app();
    let jwt = create_test_jwt(4242);

    let response = get(
        app.clone(),
        "/auth/spotify",
        Some(format!("moovit_token={}", jwt)),
    )
    .await;
    let spotify_state = state_param(&location(&response));

    let response = get(
        app,
        &format!("/auth/strava/callback?code=abc&state={}", spotify_state),
        None,
    )
    .await;

    assert_eq!(
        location(&response),
        "http://localhost:5173?error=invalid_state"
    );
}
