// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! MoovIt: the soundtrack of your workouts
//!
//! This crate provides the backend API that links a Strava account with a
//! Spotify account and works out which songs played during each activity.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use std::sync::Arc;

use config::Config;
use db::FirestoreDb;
use services::{
    ActivityAnnotator, KmsService, SoundtrackResolver, SpotifyClient, StravaClient, TokenService,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub tokens: Arc<TokenService>,
    pub strava: StravaClient,
    pub spotify: SpotifyClient,
    pub resolver: SoundtrackResolver,
    pub annotator: ActivityAnnotator,
}

impl AppState {
    /// Wire the services together over one database, KMS key and token cache.
    pub fn new(config: Config, db: FirestoreDb, kms: KmsService) -> Self {
        let strava = StravaClient::new(
            config.strava_client_id.clone(),
            config.strava_client_secret.clone(),
        );
        let spotify = SpotifyClient::new(
            config.spotify_client_id.clone(),
            config.spotify_client_secret.clone(),
        );

        let tokens = Arc::new(TokenService::new(
            db.clone(),
            kms,
            strava.clone(),
            spotify.clone(),
            Arc::new(dashmap::DashMap::new()),
            Arc::new(dashmap::DashMap::new()),
        ));

        let resolver = SoundtrackResolver::new(
            tokens.clone(),
            Arc::new(strava.clone()),
            Arc::new(spotify.clone()),
            Arc::new(db.clone()),
        );

        Self::with_resolver(config, db, tokens, strava, spotify, resolver)
    }

    /// Build state around an existing resolver (tests swap in stub collaborators).
    pub fn with_resolver(
        config: Config,
        db: FirestoreDb,
        tokens: Arc<TokenService>,
        strava: StravaClient,
        spotify: SpotifyClient,
        resolver: SoundtrackResolver,
    ) -> Self {
        let annotator = ActivityAnnotator::new(resolver.clone(), tokens.clone(), strava.clone());
        Self {
            config,
            db,
            tokens,
            strava,
            spotify,
            resolver,
            annotator,
        }
    }
}
