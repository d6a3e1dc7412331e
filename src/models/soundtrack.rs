// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cached soundtrack for one workout.

use serde::{Deserialize, Serialize};

use super::TrackRecord;
use crate::time_utils::format_utc_rfc3339;

/// Ordered tracks attributed to one activity.
///
/// Stored at: `soundtracks/{athlete_id}_{activity_id}`
///
/// Written once and never updated: a past workout window and a past
/// listening history cannot change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundtrackRecord {
    /// Strava activity ID
    pub activity_id: u64,
    /// Strava athlete ID (owner)
    pub athlete_id: u64,
    /// Tracks in the order they were played (oldest first)
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
    /// When the soundtrack was computed (ISO 8601)
    pub created_at: String,
}

impl SoundtrackRecord {
    pub fn new(activity_id: u64, athlete_id: u64, tracks: Vec<TrackRecord>) -> Self {
        Self {
            activity_id,
            athlete_id,
            tracks,
            created_at: format_utc_rfc3339(chrono::Utc::now()),
        }
    }

    /// Firestore document ID for an `(activity, athlete)` pair.
    pub fn document_id(activity_id: u64, athlete_id: u64) -> String {
        format!("{}_{}", athlete_id, activity_id)
    }

    pub fn id(&self) -> String {
        Self::document_id(self.activity_id, self.athlete_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_is_per_athlete_and_activity() {
        let record = SoundtrackRecord::new(555, 12, vec![]);
        assert_eq!(record.id(), "12_555");
        assert_ne!(
            SoundtrackRecord::document_id(555, 12),
            SoundtrackRecord::document_id(555, 13)
        );
    }

    #[test]
    fn test_empty_soundtrack_is_a_valid_record() {
        let json = serde_json::json!({
            "activity_id": 1,
            "athlete_id": 2,
            "tracks": [],
            "created_at": "2024-01-01T00:00:00Z"
        });
        let record: SoundtrackRecord = serde_json::from_value(json).unwrap();
        assert!(record.tracks.is_empty());
    }
}
