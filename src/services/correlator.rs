// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout/listening-history correlation.
//!
//! Spotify's recently-played endpoint accepts either an `after` or a `before`
//! cursor, never both. A closed window is approximated by fetching one page
//! after the workout start and one page before the workout end, then keeping
//! the plays that appear in both. Coverage is exact only while every play in
//! the window fits in a single page.

use std::collections::HashSet;

use crate::models::{PlayEvent, TrackRecord};

/// Intersect the two history pages by `played_at` and return the shared
/// plays as tracks, oldest first.
///
/// Input order does not matter. A `played_at` seen more than once in
/// `after_start` is reported once.
pub fn intersect(after_start: &[PlayEvent], before_end: &[PlayEvent]) -> Vec<TrackRecord> {
    if after_start.is_empty() || before_end.is_empty() {
        return Vec::new();
    }

    let before_end_times: HashSet<_> = before_end.iter().map(|e| e.played_at).collect();

    let mut seen = HashSet::new();
    let mut during: Vec<&PlayEvent> = after_start
        .iter()
        .filter(|e| before_end_times.contains(&e.played_at))
        .filter(|e| seen.insert(e.played_at))
        .collect();

    // Spotify returns most-recent first; the soundtrack reads oldest first.
    during.sort_by_key(|e| e.played_at);

    during.into_iter().map(TrackRecord::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn play(name: &str, played_at: DateTime<Utc>) -> PlayEvent {
        PlayEvent {
            played_at,
            track_name: name.to_string(),
            artist_names: vec![format!("{} Artist", name)],
            link: format!("https://open.spotify.com/track/{}", name),
        }
    }

    fn names(tracks: &[TrackRecord]) -> Vec<&str> {
        tracks.iter().map(|t| t.track_name.as_str()).collect()
    }

    #[test]
    fn test_empty_pages_yield_empty_soundtrack() {
        let page = vec![play("A", at(10, 5))];

        assert!(intersect(&[], &page).is_empty());
        assert!(intersect(&page, &[]).is_empty());
        assert!(intersect(&[], &[]).is_empty());
    }

    #[test]
    fn test_only_shared_timestamps_survive() {
        let after_start = vec![
            play("T1", at(10, 1)),
            play("T2", at(10, 2)),
            play("T3", at(10, 3)),
        ];
        let before_end = vec![play("T2", at(10, 2)), play("T4", at(10, 4))];

        let tracks = intersect(&after_start, &before_end);

        assert_eq!(names(&tracks), vec!["T2"]);
    }

    #[test]
    fn test_no_overlap_is_empty_not_error() {
        let after_start = vec![play("Late", at(11, 0))];
        let before_end = vec![play("Early", at(9, 0))];

        assert!(intersect(&after_start, &before_end).is_empty());
    }

    #[test]
    fn test_most_recent_first_input_comes_out_chronological() {
        // Spotify order: newest first
        let after_start = vec![
            play("Third", at(10, 20)),
            play("Second", at(10, 10)),
            play("First", at(10, 1)),
        ];
        let before_end = after_start.clone();

        let tracks = intersect(&after_start, &before_end);

        assert_eq!(names(&tracks), vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_input_order_does_not_change_matched_set() {
        let newest_first = vec![
            play("C", at(10, 20)),
            play("B", at(10, 10)),
            play("A", at(10, 1)),
        ];
        let before_end = vec![play("B", at(10, 10)), play("A", at(10, 1))];

        let mut oldest_first = newest_first.clone();
        oldest_first.reverse();
        let mut before_reversed = before_end.clone();
        before_reversed.reverse();

        let forward = intersect(&newest_first, &before_end);
        let reversed = intersect(&oldest_first, &before_reversed);

        assert_eq!(forward, reversed);
        assert_eq!(names(&forward), vec!["A", "B"]);
    }

    #[test]
    fn test_duplicate_played_at_reported_once() {
        let after_start = vec![play("A", at(10, 5)), play("A", at(10, 5))];
        let before_end = vec![play("A", at(10, 5))];

        assert_eq!(intersect(&after_start, &before_end).len(), 1);
    }

    #[test]
    fn test_workout_window_scenario() {
        // Workout 10:00-10:30. SongB played after the workout ended.
        let after_start = vec![play("SongB", at(10, 40)), play("SongA", at(10, 5))];
        let before_end = vec![play("SongA", at(10, 5))];

        let tracks = intersect(&after_start, &before_end);

        assert_eq!(names(&tracks), vec!["SongA"]);
        assert_eq!(tracks[0].artist_names, vec!["SongA Artist".to_string()]);
        assert_eq!(tracks[0].link, "https://open.spotify.com/track/SongA");
    }

    #[test]
    fn test_artist_order_is_preserved() {
        let mut event = play("Collab", at(10, 5));
        event.artist_names = vec!["Zed".to_string(), "Alpha".to_string()];

        let tracks = intersect(&[event.clone()], &[event]);

        assert_eq!(tracks[0].artist_names, vec!["Zed", "Alpha"]);
    }
}
