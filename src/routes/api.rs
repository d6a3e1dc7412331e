// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Provider, TrackRecord};
use crate::services::NowPlaying;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Soundtracks resolved at once for the recent-activities list.
const MAX_CONCURRENT_RESOLVES: usize = 4;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/auth-status", get(get_auth_status))
        .route(
            "/api/activities/{activity_id}/soundtrack",
            get(get_soundtrack),
        )
        .route("/api/recent-activities", get(get_recent_activities))
        .route("/api/current-song", get(get_current_song))
        .route(
            "/api/user/subscription",
            get(get_subscription).put(update_subscription),
        )
        .route("/api/spotify", delete(unlink_spotify))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub athlete_id: u64,
    pub firstname: String,
    pub lastname: String,
    pub profile_picture: Option<String>,
    pub is_subscribed: bool,
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state
        .db
        .get_user(user.athlete_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.athlete_id)))?;

    Ok(Json(UserResponse {
        athlete_id: profile.strava_athlete_id,
        firstname: profile.firstname,
        lastname: profile.lastname,
        profile_picture: profile.profile_picture,
        is_subscribed: profile.is_subscribed,
    }))
}

/// Which providers the user has linked.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthStatusResponse {
    pub strava: bool,
    pub spotify: bool,
}

async fn get_auth_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<AuthStatusResponse>> {
    let (strava, spotify) = tokio::try_join!(
        state.tokens.is_linked(Provider::Strava, user.athlete_id),
        state.tokens.is_linked(Provider::Spotify, user.athlete_id),
    )?;

    Ok(Json(AuthStatusResponse { strava, spotify }))
}

/// Forget the user's Spotify tokens.
async fn unlink_spotify(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode> {
    state.tokens.revoke(Provider::Spotify, user.athlete_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Soundtracks ─────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SoundtrackResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub activity_id: u64,
    pub tracks: Vec<TrackRecord>,
}

/// Songs played during one of the user's activities.
async fn get_soundtrack(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<u64>,
) -> Result<Json<SoundtrackResponse>> {
    let tracks = state.resolver.resolve(user.athlete_id, activity_id).await?;

    Ok(Json(SoundtrackResponse {
        activity_id,
        tracks,
    }))
}

#[derive(Deserialize, Validate)]
struct RecentActivitiesQuery {
    /// How far back to look
    #[serde(default = "default_days")]
    #[validate(range(min = 1, max = 30))]
    days: u32,
    /// Maximum number of activities
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 20))]
    limit: u32,
}

fn default_days() -> u32 {
    7
}
fn default_limit() -> u32 {
    5
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RecentActivity {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub name: String,
    pub start_date: String,
    pub distance: f64,
    /// `None` when the soundtrack could not be resolved
    pub playlist: Option<Vec<TrackRecord>>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RecentActivitiesResponse {
    pub activities: Vec<RecentActivity>,
}

/// Recent activities, each with its soundtrack.
async fn get_recent_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<RecentActivitiesQuery>,
) -> Result<Json<RecentActivitiesResponse>> {
    params
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let athlete_id = user.athlete_id;
    let before = chrono::Utc::now().timestamp();
    let after = before - i64::from(params.days) * 24 * 60 * 60;

    let token = state
        .tokens
        .get_valid_access_token(Provider::Strava, athlete_id)
        .await?;
    let summaries = state
        .strava
        .list_activities(&token, after, before, 1, params.limit)
        .await?;

    tracing::debug!(
        athlete_id,
        days = params.days,
        count = summaries.len(),
        "Fetched recent activities"
    );

    let activities = stream::iter(summaries)
        .map(|summary| {
            let state = state.clone();
            async move {
                let playlist = match state.resolver.resolve(athlete_id, summary.id).await {
                    Ok(tracks) => Some(tracks),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            athlete_id,
                            activity_id = summary.id,
                            "Failed to resolve soundtrack for recent activity"
                        );
                        None
                    }
                };
                RecentActivity {
                    id: summary.id,
                    name: summary.name,
                    start_date: summary.start_date,
                    distance: summary.distance,
                    playlist,
                }
            }
        })
        .buffered(MAX_CONCURRENT_RESOLVES)
        .collect::<Vec<_>>()
        .await;

    Ok(Json(RecentActivitiesResponse { activities }))
}

/// What the user is listening to right now (`null` if nothing).
async fn get_current_song(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Option<NowPlaying>>> {
    let token = state
        .tokens
        .get_valid_access_token(Provider::Spotify, user.athlete_id)
        .await?;

    Ok(Json(state.spotify.currently_playing(&token).await?))
}

// ─── Subscription ────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubscriptionStatus {
    /// Whether new activities get their soundtrack posted to Strava
    #[serde(alias = "newSubscriptionStatus")]
    pub subscribed: bool,
}

async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SubscriptionStatus>> {
    let profile = state
        .db
        .get_user(user.athlete_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.athlete_id)))?;

    Ok(Json(SubscriptionStatus {
        subscribed: profile.is_subscribed,
    }))
}

async fn update_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<SubscriptionStatus>,
) -> Result<Json<SubscriptionStatus>> {
    let updated = state
        .db
        .set_subscription(user.athlete_id, body.subscribed)
        .await?;

    Ok(Json(SubscriptionStatus {
        subscribed: updated.is_subscribed,
    }))
}
