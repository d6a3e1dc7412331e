// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod annotation;
pub mod correlator;
pub mod kms;
pub mod soundtrack;
pub mod spotify;
pub mod strava;
pub mod tokens;

pub use annotation::{ActivityAnnotator, AnnotationOutcome};
pub use kms::KmsService;
pub use soundtrack::{
    ActivityFeed, PlayCursor, PlayHistory, SoundtrackResolver, SoundtrackStore, TokenSource,
};
pub use spotify::{NowPlaying, SpotifyClient};
pub use strava::StravaClient;
pub use tokens::{CachedToken, RefreshLocks, TokenCache, TokenGrant, TokenService};
