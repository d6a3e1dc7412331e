// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Strava athlete ID (also used as document ID)
    pub strava_athlete_id: u64,
    /// First name
    pub firstname: String,
    /// Last name
    pub lastname: String,
    /// Profile picture URL
    pub profile_picture: Option<String>,
    /// Whether new activities get their soundtrack posted automatically
    #[serde(default)]
    pub is_subscribed: bool,
    /// When user first connected
    pub created_at: String,
    /// Last activity timestamp
    pub last_active: String,
}

/// User's OAuth tokens for one provider (encrypted in Firestore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTokens {
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64)
    pub refresh_token_encrypted: String,
    /// When the access token expires (ISO 8601)
    pub expires_at: String,
    /// Granted OAuth scopes
    pub scopes: Vec<String>,
}

/// Third-party account a user can link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Fitness provider; its athlete ID is our user ID.
    Strava,
    /// Music provider; supplies the listening history.
    Spotify,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Strava => "strava",
            Provider::Spotify => "spotify",
        }
    }

    /// Additional authenticated data binding an encrypted token to its owner.
    pub fn token_aad(self, athlete_id: u64) -> String {
        format!("{}:athlete_id:{}", self.as_str(), athlete_id)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_aad_differs_per_provider() {
        assert_eq!(Provider::Strava.token_aad(42), "strava:athlete_id:42");
        assert_ne!(Provider::Strava.token_aad(42), Provider::Spotify.token_aad(42));
    }

    #[test]
    fn test_missing_subscription_flag_defaults_to_false() {
        let user: User = serde_json::from_value(serde_json::json!({
            "strava_athlete_id": 7,
            "firstname": "Ada",
            "lastname": "Lovelace",
            "profile_picture": null,
            "created_at": "2024-01-01T00:00:00Z",
            "last_active": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert!(!user.is_subscribed);
    }
}
