// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const STRAVA_TOKENS: &str = "strava_tokens";
    pub const SPOTIFY_TOKENS: &str = "spotify_tokens";
    /// Cached soundtracks (keyed by `{athlete_id}_{activity_id}`)
    pub const SOUNDTRACKS: &str = "soundtracks";
}
