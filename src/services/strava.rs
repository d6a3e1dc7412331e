// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for fetching and annotating activities.
//!
//! Handles:
//! - Activity fetching (workout time windows)
//! - Activity listing and description updates
//! - OAuth code exchange and token refresh
//! - Rate limit and token error detection

use crate::error::AppError;
use crate::models::ActivityWindow;
use crate::services::soundtrack::ActivityFeed;
use async_trait::async_trait;
use serde::Deserialize;

const STRAVA_API_URL: &str = "https://www.strava.com/api/v3";
const STRAVA_TOKEN_URL: &str = "https://www.strava.com/oauth/token";

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: STRAVA_API_URL.to_string(),
            client_id,
            client_secret,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Get a detailed activity by ID.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivity, AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("include_all_efforts", "false")])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        check_response_json(response).await
    }

    /// Update an activity's description.
    pub async fn update_activity_description(
        &self,
        access_token: &str,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);

        let body = serde_json::json!({
            "description": description
        });

        let response = self
            .http
            .put(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        check_response(response).await
    }

    /// List the athlete's activities between two Unix timestamps (seconds).
    pub async fn list_activities(
        &self,
        access_token: &str,
        after: i64,
        before: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let url = format!("{}/athlete/activities", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("after", after.to_string()),
                ("before", before.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        check_response_json(response).await
    }

    /// Exchange an authorization code for tokens and the athlete profile.
    pub async fn exchange_code(&self, code: &str) -> Result<StravaTokenExchange, AppError> {
        let response = self
            .http
            .post(STRAVA_TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Strava token exchange failed");
            return Err(AppError::StravaApi(format!(
                "Token exchange failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("Failed to parse token response: {}", e)))
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(STRAVA_TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {}", e)))?;

        check_response_json(response).await
    }
}

#[async_trait]
impl ActivityFeed for StravaClient {
    async fn fetch_activity_window(
        &self,
        access_token: &str,
        athlete_id: u64,
        activity_id: u64,
    ) -> Result<ActivityWindow, AppError> {
        let activity = self.get_activity(access_token, activity_id).await?;
        activity.window(athlete_id)
    }
}

/// Map a non-success status to the matching error.
async fn status_error(response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    match status.as_u16() {
        429 => {
            tracing::warn!("Strava rate limit hit (429)");
            AppError::StravaApi(AppError::RATE_LIMITED.to_string())
        }
        401 => AppError::StravaApi(AppError::TOKEN_REJECTED.to_string()),
        404 => AppError::NotFound("Strava activity".to_string()),
        _ => AppError::StravaApi(format!("HTTP {}: {}", status, body)),
    }
}

/// Check response status and return error if not successful.
async fn check_response(response: reqwest::Response) -> Result<(), AppError> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(status_error(response).await)
}

/// Check response and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct StravaTokenExchange {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    pub profile: Option<String>,
}

/// Detailed Strava activity response.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivity {
    pub id: u64,
    pub name: String,
    /// UTC start time (ISO 8601)
    pub start_date: String,
    pub start_date_local: Option<String>,
    /// Wall-clock duration in seconds, including pauses
    pub elapsed_time: u64,
    #[serde(default)]
    pub distance: f64,
    pub description: Option<String>,
}

impl StravaActivity {
    /// The activity's time window.
    pub fn window(&self, athlete_id: u64) -> Result<ActivityWindow, AppError> {
        ActivityWindow::from_start_and_elapsed(
            self.id,
            athlete_id,
            &self.start_date,
            self.elapsed_time,
        )
        .ok_or_else(|| {
            AppError::StravaApi(format!(
                "Invalid start_date for activity {}: {:?}",
                self.id, self.start_date
            ))
        })
    }
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    pub name: String,
    pub start_date: String,
    pub start_date_local: Option<String>,
    #[serde(default)]
    pub distance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_window_from_payload() {
        let activity: StravaActivity = serde_json::from_value(serde_json::json!({
            "id": 987,
            "name": "Morning Run",
            "start_date": "2024-01-01T10:00:00Z",
            "start_date_local": "2024-01-01T02:00:00Z",
            "elapsed_time": 1800,
            "distance": 5012.3,
            "description": null,
            "map": { "summary_polyline": "abc" }
        }))
        .unwrap();

        let window = activity.window(42).unwrap();
        assert_eq!(window.activity_id, 987);
        assert_eq!(window.athlete_id, 42);
        assert_eq!(window.end_time_ms - window.start_time_ms, 1_800_000);
    }

    #[test]
    fn test_activity_window_rejects_malformed_start() {
        let activity: StravaActivity = serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "Broken",
            "start_date": "",
            "elapsed_time": 60
        }))
        .unwrap();

        assert!(matches!(activity.window(1), Err(AppError::StravaApi(_))));
    }

    #[test]
    fn test_payload_missing_elapsed_time_fails_to_parse() {
        let result: Result<StravaActivity, _> = serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "No duration",
            "start_date": "2024-01-01T10:00:00Z"
        }));
        assert!(result.is_err());
    }
}
