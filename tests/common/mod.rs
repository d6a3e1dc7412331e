// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use moovit::config::Config;
use moovit::db::FirestoreDb;
use moovit::error::AppError;
use moovit::models::{ActivityWindow, PlayEvent, Provider, SoundtrackRecord};
use moovit::routes::create_router;
use moovit::services::{
    ActivityFeed, KmsService, PlayCursor, PlayHistory, SoundtrackResolver, SoundtrackStore,
    SpotifyClient, StravaClient, TokenService, TokenSource,
};
use moovit::AppState;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Generate a unique ID for test isolation.
#[allow(dead_code)]
pub fn unique_id() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

/// Offline token service over the given database and a fresh cache.
#[allow(dead_code)]
pub fn test_token_service(config: &Config, db: FirestoreDb) -> TokenService {
    TokenService::new(
        db,
        KmsService::new_mock(),
        StravaClient::new(config.strava_client_id.clone(), config.strava_client_secret.clone()),
        SpotifyClient::new(config.spotify_client_id.clone(), config.spotify_client_secret.clone()),
        Arc::new(dashmap::DashMap::new()),
        Arc::new(dashmap::DashMap::new()),
    )
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        Config::test_default(),
        test_db_offline(),
        KmsService::new_mock(),
    ));

    (create_router(state.clone()), state)
}

/// Create a test app whose soundtrack resolver uses the given collaborators.
#[allow(dead_code)]
pub fn create_test_app_with_resolver(resolver: SoundtrackResolver) -> axum::Router {
    let config = Config::test_default();
    let db = test_db_offline();
    let tokens = Arc::new(test_token_service(&config, db.clone()));
    let strava = StravaClient::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
    );
    let spotify = SpotifyClient::new(
        config.spotify_client_id.clone(),
        config.spotify_client_secret.clone(),
    );

    let state = Arc::new(AppState::with_resolver(
        config, db, tokens, strava, spotify, resolver,
    ));

    create_router(state)
}

/// Session JWT signed with the test config's key.
#[allow(dead_code)]
pub fn create_test_jwt(athlete_id: u64) -> String {
    moovit::middleware::auth::create_jwt(athlete_id, &Config::test_default().jwt_signing_key)
        .unwrap()
}

// ─── Time helpers ────────────────────────────────────────────

#[allow(dead_code)]
pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
}

#[allow(dead_code)]
pub fn play(name: &str, played_at: DateTime<Utc>) -> PlayEvent {
    PlayEvent {
        played_at,
        track_name: name.to_string(),
        artist_names: vec![format!("{} Artist", name)],
        link: format!("https://open.spotify.com/track/{}", name),
    }
}

/// Workout 10:00 to 10:30 on 2024-01-01.
#[allow(dead_code)]
pub fn workout_window(athlete_id: u64, activity_id: u64) -> ActivityWindow {
    ActivityWindow::from_start_and_elapsed(activity_id, athlete_id, "2024-01-01T10:00:00Z", 1800)
        .unwrap()
}

// ─── Stub collaborators ──────────────────────────────────────

/// Token source that counts calls and can refuse.
#[derive(Default)]
pub struct StubTokens {
    pub calls: AtomicUsize,
    pub unlinked: bool,
}

#[allow(dead_code)]
impl StubTokens {
    pub fn unlinked() -> Self {
        Self {
            unlinked: true,
            ..Default::default()
        }
    }

    fn token(&self, provider: Provider, athlete_id: u64) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unlinked {
            return Err(AppError::NotLinked(provider));
        }
        Ok(format!("{}_token_{}", provider, athlete_id))
    }
}

#[async_trait]
impl TokenSource for StubTokens {
    async fn fitness_token(&self, athlete_id: u64) -> Result<String, AppError> {
        self.token(Provider::Strava, athlete_id)
    }

    async fn music_token(&self, athlete_id: u64) -> Result<String, AppError> {
        self.token(Provider::Spotify, athlete_id)
    }
}

/// Activity feed returning a fixed window (or failing when `window` is `None`).
pub struct StubActivities {
    pub window: Option<ActivityWindow>,
    pub calls: AtomicUsize,
    /// When set, every fetch waits here so concurrent callers overlap.
    pub barrier: Option<Arc<Barrier>>,
}

#[allow(dead_code)]
impl StubActivities {
    pub fn new(window: ActivityWindow) -> Self {
        Self {
            window: Some(window),
            calls: AtomicUsize::new(0),
            barrier: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            window: None,
            calls: AtomicUsize::new(0),
            barrier: None,
        }
    }

    pub fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }
}

#[async_trait]
impl ActivityFeed for StubActivities {
    async fn fetch_activity_window(
        &self,
        access_token: &str,
        _athlete_id: u64,
        _activity_id: u64,
    ) -> Result<ActivityWindow, AppError> {
        assert!(access_token.starts_with("strava_token_"));
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }

        self.window
            .ok_or_else(|| AppError::StravaApi("HTTP 500 Internal Server Error: ".to_string()))
    }
}

/// Listening history serving one fixed page per cursor direction.
#[derive(Default)]
pub struct StubPlays {
    pub after_start: Vec<PlayEvent>,
    pub before_end: Vec<PlayEvent>,
    pub cursors: Mutex<Vec<PlayCursor>>,
    /// When set, every `Before` request fails with a Spotify error.
    pub fail_before: bool,
}

#[allow(dead_code)]
impl StubPlays {
    pub fn new(after_start: Vec<PlayEvent>, before_end: Vec<PlayEvent>) -> Self {
        Self {
            after_start,
            before_end,
            cursors: Mutex::new(Vec::new()),
            fail_before: false,
        }
    }

    /// Serves `after_start` normally but fails the page before the end.
    pub fn failing_before(after_start: Vec<PlayEvent>) -> Self {
        Self {
            after_start,
            fail_before: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.cursors.lock().unwrap().len()
    }
}

#[async_trait]
impl PlayHistory for StubPlays {
    async fn fetch_recent_plays(
        &self,
        access_token: &str,
        cursor: PlayCursor,
        limit: u32,
    ) -> Result<Vec<PlayEvent>, AppError> {
        assert!(access_token.starts_with("spotify_token_"));
        assert_eq!(limit, 50);
        self.cursors.lock().unwrap().push(cursor);

        match cursor {
            PlayCursor::After(_) => Ok(self.after_start.clone()),
            PlayCursor::Before(_) if self.fail_before => Err(AppError::SpotifyApi(
                "HTTP 502 Bad Gateway: ".to_string(),
            )),
            PlayCursor::Before(_) => Ok(self.before_end.clone()),
        }
    }
}

/// In-memory soundtrack store with create-only semantics.
#[derive(Default)]
pub struct MemoryStore {
    pub records: Mutex<HashMap<String, SoundtrackRecord>>,
    pub created: AtomicUsize,
    pub rejected: AtomicUsize,
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    pub fn with_record(record: SoundtrackRecord) -> Self {
        let store = Self::default();
        store.records.lock().unwrap().insert(record.id(), record);
        store
    }

    pub fn get(&self, activity_id: u64, athlete_id: u64) -> Option<SoundtrackRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&SoundtrackRecord::document_id(activity_id, athlete_id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl SoundtrackStore for MemoryStore {
    async fn find(
        &self,
        activity_id: u64,
        athlete_id: u64,
    ) -> Result<Option<SoundtrackRecord>, AppError> {
        Ok(self.get(activity_id, athlete_id))
    }

    async fn create(&self, record: &SoundtrackRecord) -> Result<bool, AppError> {
        if self.fail_writes {
            return Err(AppError::Database("write unavailable".to_string()));
        }

        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.id()) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            return Ok(false);
        }
        records.insert(record.id(), record.clone());
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

/// Stubs bundled with a resolver built over them.
#[allow(dead_code)]
pub struct ResolverHarness {
    pub tokens: Arc<StubTokens>,
    pub activities: Arc<StubActivities>,
    pub plays: Arc<StubPlays>,
    pub store: Arc<MemoryStore>,
    pub resolver: SoundtrackResolver,
}

#[allow(dead_code)]
impl ResolverHarness {
    pub fn new(
        tokens: StubTokens,
        activities: StubActivities,
        plays: StubPlays,
        store: MemoryStore,
    ) -> Self {
        let tokens = Arc::new(tokens);
        let activities = Arc::new(activities);
        let plays = Arc::new(plays);
        let store = Arc::new(store);

        let resolver = SoundtrackResolver::new(
            tokens.clone(),
            activities.clone(),
            plays.clone(),
            store.clone(),
        );

        Self {
            tokens,
            activities,
            plays,
            store,
            resolver,
        }
    }
}
