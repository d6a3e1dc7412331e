// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Posting a workout's soundtrack into its Strava description.
//!
//! Runs for subscribed athletes when Strava reports a new activity:
//! 1. Fetch the activity and skip it if it already carries our signature
//! 2. Resolve the soundtrack
//! 3. Append the track list to the description (nothing is written when no
//!    music played)

use std::sync::Arc;

use crate::error::Result;
use crate::models::{Provider, TrackRecord};
use crate::services::{SoundtrackResolver, StravaClient, TokenService};

/// Last line of every annotation; also marks an activity as annotated.
pub const SIGNATURE: &str = "- MoovIt 🐮";

/// What happened to an activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationOutcome {
    Annotated { tracks: usize },
    NoMusic,
    AlreadyAnnotated,
}

/// Writes soundtracks into Strava activity descriptions.
#[derive(Clone)]
pub struct ActivityAnnotator {
    resolver: SoundtrackResolver,
    tokens: Arc<TokenService>,
    strava: StravaClient,
}

impl ActivityAnnotator {
    pub fn new(
        resolver: SoundtrackResolver,
        tokens: Arc<TokenService>,
        strava: StravaClient,
    ) -> Self {
        Self {
            resolver,
            tokens,
            strava,
        }
    }

    pub async fn annotate(&self, athlete_id: u64, activity_id: u64) -> Result<AnnotationOutcome> {
        tracing::info!(athlete_id, activity_id, "Annotating activity");

        let token = self
            .tokens
            .get_valid_access_token(Provider::Strava, athlete_id)
            .await?;
        let activity = self.strava.get_activity(&token, activity_id).await?;

        if is_annotated(activity.description.as_deref()) {
            tracing::debug!(athlete_id, activity_id, "Activity already annotated");
            return Ok(AnnotationOutcome::AlreadyAnnotated);
        }

        let tracks = self.resolver.resolve(athlete_id, activity_id).await?;
        if tracks.is_empty() {
            tracing::info!(athlete_id, activity_id, "No music during activity");
            return Ok(AnnotationOutcome::NoMusic);
        }

        let description =
            append_annotation(activity.description.as_deref(), &build_annotation(&tracks));

        // Re-fetch the token: resolving may have taken long enough for a refresh.
        let token = self
            .tokens
            .get_valid_access_token(Provider::Strava, athlete_id)
            .await?;
        self.strava
            .update_activity_description(&token, activity_id, &description)
            .await?;

        tracing::info!(
            athlete_id,
            activity_id,
            tracks = tracks.len(),
            "Soundtrack posted to Strava"
        );

        Ok(AnnotationOutcome::Annotated {
            tracks: tracks.len(),
        })
    }
}

/// One line per track, then the signature.
pub fn build_annotation(tracks: &[TrackRecord]) -> String {
    let mut lines: Vec<String> = tracks.iter().map(ToString::to_string).collect();
    lines.push(SIGNATURE.to_string());
    lines.join("\n")
}

/// Append annotation to existing description.
pub fn append_annotation(existing: Option<&str>, annotation: &str) -> String {
    match existing {
        Some(desc) if !desc.trim().is_empty() => format!("{}\n\n{}", desc.trim_end(), annotation),
        _ => annotation.to_string(),
    }
}

pub fn is_annotated(description: Option<&str>) -> bool {
    description.is_some_and(|d| d.contains(SIGNATURE))
}
