// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth routes: Strava sign-in and Spotify account linking.
//!
//! Both flows carry an HMAC-signed `state` parameter of the form
//! `provider|athlete_id|timestamp_hex|signature_hex` (base64url). The
//! Spotify flow starts from an authenticated session, so its state carries
//! the athlete ID the callback links the tokens to.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Extension, Router,
};
use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::middleware::auth::{clear_session_cookie, create_jwt, session_cookie, AuthUser};
use crate::models::{Provider, User};
use crate::services::TokenGrant;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

const STRAVA_AUTHORIZE_URL: &str = "https://www.strava.com/oauth/authorize";
const SPOTIFY_AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";

const STRAVA_SCOPES: &str = "read,activity:read_all,activity:write";
const SPOTIFY_SCOPES: &str =
    "user-read-private user-read-email user-read-recently-played user-read-currently-playing";

/// How long a signed OAuth state stays valid (10 minutes).
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

/// Public OAuth routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/strava", get(strava_start))
        .route("/auth/strava/callback", get(strava_callback))
        .route("/auth/spotify/callback", get(spotify_callback))
        .route("/auth/logout", get(logout))
}

/// OAuth routes that need a session (linking a second provider).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/spotify", get(spotify_start))
}

fn now_ms() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Build a signed, URL-safe OAuth state.
fn sign_state(
    provider: Provider,
    athlete_id: Option<u64>,
    timestamp_ms: u128,
    secret: &[u8],
) -> Result<String> {
    let athlete = athlete_id.map(|id| id.to_string()).unwrap_or_default();
    let payload = format!("{}|{}|{:x}", provider, athlete, timestamp_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verified contents of an OAuth state.
#[derive(Debug, PartialEq, Eq)]
struct VerifiedState {
    athlete_id: Option<u64>,
}

/// Verify the signature, provider and age of an OAuth state.
fn verify_state(
    state: &str,
    expected: Provider,
    now_ms: u128,
    secret: &[u8],
) -> Option<VerifiedState> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    let (payload, signature_hex) = state_str.rsplit_once('|')?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let signature = hex::decode(signature_hex).ok()?;
    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let parts: Vec<&str> = payload.split('|').collect();
    let [provider, athlete, timestamp_hex] = parts.as_slice() else {
        return None;
    };

    if *provider != expected.as_str() {
        tracing::warn!(provider = %provider, %expected, "OAuth state issued for another provider");
        return None;
    }

    let timestamp = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if now_ms.saturating_sub(timestamp) > STATE_MAX_AGE_MS {
        tracing::warn!("OAuth state expired");
        return None;
    }

    let athlete_id = if athlete.is_empty() {
        None
    } else {
        Some(athlete.parse().ok()?)
    };

    Some(VerifiedState { athlete_id })
}

fn frontend_redirect(state: &AppState, query: Option<(&str, &str)>) -> Redirect {
    let url = match query {
        Some((key, value)) => format!(
            "{}?{}={}",
            state.config.frontend_url,
            key,
            urlencoding::encode(value)
        ),
        None => state.config.frontend_url.clone(),
    };
    Redirect::temporary(&url)
}

// ─── Strava (sign-in) ────────────────────────────────────────

/// Start OAuth flow - redirect to Strava authorization.
async fn strava_start(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let oauth_state = sign_state(Provider::Strava, None, now_ms()?, &state.config.oauth_state_key)?;
    let callback_url = format!("{}/auth/strava/callback", state.config.api_url);

    let auth_url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&approval_prompt=auto&scope={}&state={}",
        STRAVA_AUTHORIZE_URL,
        state.config.strava_client_id,
        urlencoding::encode(&callback_url),
        STRAVA_SCOPES,
        oauth_state
    );

    tracing::info!(
        client_id = %state.config.strava_client_id,
        "Starting OAuth flow, redirecting to Strava"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, create session.
async fn strava_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        return Ok((jar, frontend_redirect(&state, Some(("error", error.as_str())))));
    }

    if verify_state(
        &params.state,
        Provider::Strava,
        now_ms()?,
        &state.config.oauth_state_key,
    )
    .is_none()
    {
        return Ok((jar, frontend_redirect(&state, Some(("error", "invalid_state")))));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    tracing::info!("Exchanging Strava authorization code for tokens");
    let exchange = state.strava.exchange_code(&code).await?;
    let athlete_id = exchange.athlete.id;
    let now = format_utc_rfc3339(Utc::now());

    // Returning users keep their subscription choice and sign-up date.
    let existing = state.db.get_user(athlete_id).await?;
    let user = User {
        strava_athlete_id: athlete_id,
        firstname: exchange.athlete.firstname.clone(),
        lastname: exchange.athlete.lastname.clone(),
        profile_picture: exchange.athlete.profile.clone(),
        is_subscribed: existing.as_ref().is_some_and(|u| u.is_subscribed),
        created_at: existing
            .map(|u| u.created_at)
            .unwrap_or_else(|| now.clone()),
        last_active: now,
    };
    state.db.upsert_user(&user).await?;

    let grant = TokenGrant {
        access_token: exchange.access_token,
        refresh_token: exchange.refresh_token,
        expires_at: chrono::DateTime::from_timestamp(exchange.expires_at, 0)
            .unwrap_or_else(Utc::now),
        scopes: STRAVA_SCOPES.split(',').map(str::to_string).collect(),
    };
    state
        .tokens
        .store_tokens(Provider::Strava, athlete_id, &grant)
        .await?;

    tracing::info!(
        athlete_id,
        firstname = %user.firstname,
        "OAuth successful, user and tokens stored"
    );

    let jwt = create_jwt(athlete_id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;
    let jar = jar.add(session_cookie(jwt, !state.config.is_local()));

    Ok((jar, frontend_redirect(&state, None)))
}

// ─── Spotify (account linking) ───────────────────────────────

fn spotify_callback_url(state: &AppState) -> String {
    format!("{}/auth/spotify/callback", state.config.api_url)
}

/// Redirect a signed-in user to Spotify authorization.
async fn spotify_start(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Redirect> {
    let oauth_state = sign_state(
        Provider::Spotify,
        Some(user.athlete_id),
        now_ms()?,
        &state.config.oauth_state_key,
    )?;

    let auth_url = format!(
        "{}?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
        SPOTIFY_AUTHORIZE_URL,
        state.config.spotify_client_id,
        urlencoding::encode(&spotify_callback_url(&state)),
        urlencoding::encode(SPOTIFY_SCOPES),
        oauth_state
    );

    tracing::info!(athlete_id = user.athlete_id, "Redirecting to Spotify authorization");

    Ok(Redirect::temporary(&auth_url))
}

/// Spotify callback - store tokens for the athlete named in the state.
async fn spotify_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Spotify");
        return Ok(frontend_redirect(&state, Some(("error", error.as_str()))));
    }

    let athlete_id = match verify_state(
        &params.state,
        Provider::Spotify,
        now_ms()?,
        &state.config.oauth_state_key,
    ) {
        Some(VerifiedState {
            athlete_id: Some(id),
        }) => id,
        _ => return Ok(frontend_redirect(&state, Some(("error", "invalid_state")))),
    };

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let token = state
        .spotify
        .exchange_code(&code, &spotify_callback_url(&state))
        .await?;

    let refresh_token = token.refresh_token.ok_or_else(|| {
        AppError::SpotifyApi("Token exchange returned no refresh token".to_string())
    })?;

    let grant = TokenGrant {
        access_token: token.access_token,
        refresh_token,
        expires_at: Utc::now() + Duration::seconds(token.expires_in),
        scopes: token.scope.split_whitespace().map(str::to_string).collect(),
    };
    state
        .tokens
        .store_tokens(Provider::Spotify, athlete_id, &grant)
        .await?;

    tracing::info!(athlete_id, "Spotify account linked");

    Ok(frontend_redirect(&state, Some(("spotify", "linked"))))
}

/// Logout - clear the session cookie and return to the frontend.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = jar.add(clear_session_cookie(!state.config.is_local()));
    (jar, frontend_redirect(&state, None))
}
