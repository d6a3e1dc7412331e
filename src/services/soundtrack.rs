// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Soundtrack resolution: which songs played during a workout.
//!
//! Flow on a cache miss:
//! 1. Get Strava and Spotify access tokens for the athlete
//! 2. Fetch the activity's start time and elapsed time from Strava
//! 3. Fetch one history page after the start and one before the end
//! 4. Intersect the pages (see [`correlator`](super::correlator))
//! 5. Store the soundtrack (create-only) and return it
//!
//! Nothing guards against two requests computing the same soundtrack at
//! once. Both produce the same tracks; the second insert loses and is ignored.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{ActivityWindow, PlayEvent, SoundtrackRecord, TrackRecord};
use crate::services::correlator;

/// Page size for each recently-played request (Spotify's maximum).
pub const HISTORY_PAGE_SIZE: u32 = 50;

/// Supplies a usable access token per provider, refreshing if needed.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fitness_token(&self, athlete_id: u64) -> Result<String>;
    async fn music_token(&self, athlete_id: u64) -> Result<String>;
}

/// Source of workout windows.
#[async_trait]
pub trait ActivityFeed: Send + Sync {
    async fn fetch_activity_window(
        &self,
        access_token: &str,
        athlete_id: u64,
        activity_id: u64,
    ) -> Result<ActivityWindow>;
}

/// One-sided cursor into the listening history (Unix epoch milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayCursor {
    After(i64),
    Before(i64),
}

/// Source of recently-played pages, most recent first.
#[async_trait]
pub trait PlayHistory: Send + Sync {
    async fn fetch_recent_plays(
        &self,
        access_token: &str,
        cursor: PlayCursor,
        limit: u32,
    ) -> Result<Vec<PlayEvent>>;
}

/// Persistent soundtrack cache keyed by `(activity_id, athlete_id)`.
#[async_trait]
pub trait SoundtrackStore: Send + Sync {
    async fn find(&self, activity_id: u64, athlete_id: u64) -> Result<Option<SoundtrackRecord>>;

    /// Insert a new record. Returns `Ok(false)` if one already exists;
    /// the existing record is left untouched.
    async fn create(&self, record: &SoundtrackRecord) -> Result<bool>;
}

/// Cache-first soundtrack lookup.
#[derive(Clone)]
pub struct SoundtrackResolver {
    tokens: Arc<dyn TokenSource>,
    activities: Arc<dyn ActivityFeed>,
    plays: Arc<dyn PlayHistory>,
    store: Arc<dyn SoundtrackStore>,
}

impl SoundtrackResolver {
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        activities: Arc<dyn ActivityFeed>,
        plays: Arc<dyn PlayHistory>,
        store: Arc<dyn SoundtrackStore>,
    ) -> Self {
        Self {
            tokens,
            activities,
            plays,
            store,
        }
    }

    /// Tracks played during the activity, oldest first.
    ///
    /// An empty list is a real answer ("no music during this workout") and is
    /// cached like any other. Any upstream failure aborts before anything is
    /// cached, so the next call starts over.
    pub async fn resolve(&self, athlete_id: u64, activity_id: u64) -> Result<Vec<TrackRecord>> {
        if let Some(cached) = self.store.find(activity_id, athlete_id).await? {
            tracing::debug!(
                athlete_id,
                activity_id,
                tracks = cached.tracks.len(),
                "Soundtrack cache hit"
            );
            return Ok(cached.tracks);
        }

        tracing::info!(athlete_id, activity_id, "Computing soundtrack");

        let (fitness_token, music_token) = tokio::try_join!(
            self.tokens.fitness_token(athlete_id),
            self.tokens.music_token(athlete_id),
        )?;

        let window = self
            .activities
            .fetch_activity_window(&fitness_token, athlete_id, activity_id)
            .await?;

        let (after_start, before_end) = tokio::try_join!(
            self.plays.fetch_recent_plays(
                &music_token,
                PlayCursor::After(window.start_time_ms),
                HISTORY_PAGE_SIZE,
            ),
            self.plays.fetch_recent_plays(
                &music_token,
                PlayCursor::Before(window.end_time_ms),
                HISTORY_PAGE_SIZE,
            ),
        )?;

        let tracks = correlator::intersect(&after_start, &before_end);

        tracing::info!(
            athlete_id,
            activity_id,
            after_start = after_start.len(),
            before_end = before_end.len(),
            tracks = tracks.len(),
            "Soundtrack computed"
        );

        let record = SoundtrackRecord::new(activity_id, athlete_id, tracks);

        match self.store.create(&record).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(
                    athlete_id,
                    activity_id,
                    "Soundtrack already stored by a concurrent request"
                );
            }
            Err(e) => {
                // Nothing was cached; the next request recomputes.
                tracing::warn!(
                    error = %e,
                    athlete_id,
                    activity_id,
                    "Failed to store soundtrack"
                );
            }
        }

        Ok(record.tracks)
    }
}
