// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for Strava events.

use crate::services::AnnotationOutcome;
use crate::AppState;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook", get(verify).post(handle_event))
}

/// Strava webhook verification query params.
#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode", default)]
    mode: String,
    #[serde(rename = "hub.challenge", default)]
    challenge: String,
    #[serde(rename = "hub.verify_token", default)]
    verify_token: String,
}

/// Verification response.
#[derive(Serialize, Default)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

/// Verify webhook subscription (GET).
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    let token_matches: bool = params
        .verify_token
        .as_bytes()
        .ct_eq(state.config.webhook_verify_token.as_bytes())
        .into();

    if params.mode == "subscribe" && token_matches {
        tracing::info!("Webhook subscription verified");
        (
            StatusCode::OK,
            Json(VerifyResponse {
                challenge: params.challenge,
            }),
        )
    } else {
        tracing::warn!(
            mode = %params.mode,
            "Webhook verification failed: invalid token"
        );
        (StatusCode::FORBIDDEN, Json(VerifyResponse::default()))
    }
}

/// Strava webhook event payload.
#[derive(Deserialize, Debug)]
struct WebhookEvent {
    object_type: String, // "activity" or "athlete"
    object_id: u64,
    aspect_type: String, // "create", "update", "delete"
    owner_id: u64,
}

/// Handle incoming webhook events (POST).
///
/// Always answers 200 quickly; Strava retries anything else. Annotation runs
/// in the background.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    let event: WebhookEvent = match serde_json::from_value(payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse webhook event");
            return StatusCode::OK;
        }
    };

    tracing::info!(
        object_type = %event.object_type,
        object_id = event.object_id,
        aspect_type = %event.aspect_type,
        owner_id = event.owner_id,
        "Webhook event received"
    );

    if event.object_type != "activity" || event.aspect_type != "create" {
        tracing::debug!(
            object_type = %event.object_type,
            aspect_type = %event.aspect_type,
            "Ignoring unhandled event type"
        );
        return StatusCode::OK;
    }

    tokio::spawn(annotate_if_subscribed(state, event.owner_id, event.object_id));

    StatusCode::OK
}

async fn annotate_if_subscribed(state: Arc<AppState>, athlete_id: u64, activity_id: u64) {
    match state.db.get_user(athlete_id).await {
        Ok(Some(user)) if user.is_subscribed => {}
        Ok(_) => {
            tracing::debug!(athlete_id, activity_id, "Owner not subscribed, skipping");
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, athlete_id, "Failed to load webhook owner");
            return;
        }
    }

    match state.annotator.annotate(athlete_id, activity_id).await {
        Ok(AnnotationOutcome::Annotated { tracks }) => {
            tracing::info!(athlete_id, activity_id, tracks, "Webhook annotation done");
        }
        Ok(outcome) => {
            tracing::info!(athlete_id, activity_id, ?outcome, "Webhook annotation skipped");
        }
        Err(e) if e.is_upstream_token_error() => {
            tracing::warn!(error = %e, athlete_id, "Provider not linked or token revoked");
        }
        Err(e) => {
            tracing::error!(error = %e, athlete_id, activity_id, "Webhook annotation failed");
        }
    }
}
