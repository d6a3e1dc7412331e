// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Listening history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// One playback from a user's recently-played history.
///
/// `played_at` is assigned by Spotify and is unique within one user's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayEvent {
    pub played_at: DateTime<Utc>,
    pub track_name: String,
    /// Artist names in the order Spotify lists them
    pub artist_names: Vec<String>,
    /// Link to the track on Spotify (empty if not provided)
    pub link: String,
}

/// A track as shown to the user and stored in a soundtrack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TrackRecord {
    pub track_name: String,
    pub artist_names: Vec<String>,
    pub link: String,
}

impl From<&PlayEvent> for TrackRecord {
    fn from(event: &PlayEvent) -> Self {
        Self {
            track_name: event.track_name.clone(),
            artist_names: event.artist_names.clone(),
            link: event.link.clone(),
        }
    }
}

/// `"Track - Artist A, Artist B"`
impl fmt::Display for TrackRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.artist_names.is_empty() {
            return f.write_str(&self.track_name);
        }
        write!(f, "{} - {}", self.track_name, self.artist_names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_artists_in_order() {
        let track = TrackRecord {
            track_name: "Under Pressure".to_string(),
            artist_names: vec!["Queen".to_string(), "David Bowie".to_string()],
            link: String::new(),
        };
        assert_eq!(track.to_string(), "Under Pressure - Queen, David Bowie");
    }

    #[test]
    fn test_display_without_artists() {
        let track = TrackRecord {
            track_name: "Field Recording".to_string(),
            artist_names: vec![],
            link: String::new(),
        };
        assert_eq!(track.to_string(), "Field Recording");
    }
}
