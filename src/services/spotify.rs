// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify Web API client for listening history.
//!
//! Handles:
//! - Recently-played pages (one-sided `after`/`before` cursors)
//! - Currently playing track
//! - OAuth code exchange and token refresh (client credentials via Basic auth)

use crate::error::AppError;
use crate::models::{PlayEvent, TrackRecord};
use crate::services::soundtrack::{PlayCursor, PlayHistory};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Largest page the recently-played endpoint serves.
const MAX_HISTORY_LIMIT: u32 = 50;

/// Spotify API client.
#[derive(Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl SpotifyClient {
    /// Create a new Spotify client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: SPOTIFY_API_URL.to_string(),
            client_id,
            client_secret,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Fetch one page of recently-played tracks, most recent first.
    pub async fn recently_played(
        &self,
        access_token: &str,
        cursor: PlayCursor,
        limit: u32,
    ) -> Result<Vec<PlayEvent>, AppError> {
        let url = format!("{}/me/player/recently-played", self.base_url);
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);

        let cursor_param = match cursor {
            PlayCursor::After(ms) => ("after", ms.to_string()),
            PlayCursor::Before(ms) => ("before", ms.to_string()),
        };

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("limit", limit.to_string()), cursor_param])
            .send()
            .await
            .map_err(|e| AppError::SpotifyApi(e.to_string()))?;

        let page: RecentlyPlayedPage = check_response_json(response).await?;
        Ok(page.into_events())
    }

    /// Get the track currently playing, if any.
    pub async fn currently_playing(
        &self,
        access_token: &str,
    ) -> Result<Option<NowPlaying>, AppError> {
        let url = format!("{}/me/player/currently-playing", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::SpotifyApi(e.to_string()))?;

        // 204: nothing playing
        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let current: CurrentlyPlayingResponse = check_response_json(response).await?;
        Ok(current.into_now_playing())
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<SpotifyTokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    /// Refresh an expired access token.
    ///
    /// Spotify usually keeps the old refresh token valid and omits a new one.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<SpotifyTokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<SpotifyTokenResponse, AppError> {
        let response = self
            .http
            .post(SPOTIFY_TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::SpotifyApi(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Spotify token request failed");
            // Keep the OAuth error code so callers can spot revoked grants.
            return Err(AppError::SpotifyApi(format!(
                "Token request failed with status {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::SpotifyApi(format!("Failed to parse token response: {}", e)))
    }
}

#[async_trait]
impl PlayHistory for SpotifyClient {
    async fn fetch_recent_plays(
        &self,
        access_token: &str,
        cursor: PlayCursor,
        limit: u32,
    ) -> Result<Vec<PlayEvent>, AppError> {
        self.recently_played(access_token, cursor, limit).await
    }
}

/// Check response and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        return Err(match status.as_u16() {
            429 => {
                tracing::warn!("Spotify rate limit hit (429)");
                AppError::SpotifyApi(AppError::RATE_LIMITED.to_string())
            }
            401 => AppError::SpotifyApi(AppError::TOKEN_REJECTED.to_string()),
            _ => AppError::SpotifyApi(format!("HTTP {}: {}", status, body)),
        });
    }

    response
        .json()
        .await
        .map_err(|e| AppError::SpotifyApi(format!("JSON parse error: {}", e)))
}

/// Token response from the Spotify accounts service.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
}

#[derive(Debug, Deserialize)]
struct RecentlyPlayedPage {
    #[serde(default)]
    items: Vec<PlayHistoryItem>,
}

impl RecentlyPlayedPage {
    fn into_events(self) -> Vec<PlayEvent> {
        self.items
            .into_iter()
            .map(|item| PlayEvent {
                played_at: item.played_at,
                track_name: item.track.name,
                artist_names: item.track.artists.into_iter().map(|a| a.name).collect(),
                link: item.track.external_urls.spotify_link(),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct PlayHistoryItem {
    played_at: DateTime<Utc>,
    track: SpotifyTrack,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
struct ExternalUrls(HashMap<String, String>);

impl ExternalUrls {
    fn spotify_link(mut self) -> String {
        self.0.remove("spotify").unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct CurrentlyPlayingResponse {
    #[serde(default)]
    is_playing: bool,
    progress_ms: Option<u64>,
    item: Option<SpotifyTrack>,
}

impl CurrentlyPlayingResponse {
    fn into_now_playing(self) -> Option<NowPlaying> {
        let track = self.item?;
        Some(NowPlaying {
            track: TrackRecord {
                track_name: track.name,
                artist_names: track.artists.into_iter().map(|a| a.name).collect(),
                link: track.external_urls.spotify_link(),
            },
            is_playing: self.is_playing,
            progress_ms: self.progress_ms,
        })
    }
}

/// Currently playing track.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct NowPlaying {
    pub track: TrackRecord,
    pub is_playing: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub progress_ms: Option<u64>,
}
