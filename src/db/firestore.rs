// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile and subscription flag)
//! - Tokens (encrypted OAuth tokens, one collection per provider)
//! - Soundtracks (write-once cache of resolved workout soundtracks)

use async_trait::async_trait;

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Provider, SoundtrackRecord, User, UserTokens};
use crate::services::soundtrack::SoundtrackStore;
use crate::time_utils::format_utc_rfc3339;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

fn tokens_collection(provider: Provider) -> &'static str {
    match provider {
        Provider::Strava => collections::STRAVA_TOKENS,
        Provider::Spotify => collections::SPOTIFY_TOKENS,
    }
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator takes an unauthenticated connection.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by their Strava athlete ID.
    pub async fn get_user(&self, athlete_id: u64) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(&athlete_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(user.strava_athlete_id.to_string())
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Turn automatic soundtrack posting on or off for a user.
    pub async fn set_subscription(
        &self,
        athlete_id: u64,
        subscribed: bool,
    ) -> Result<User, AppError> {
        let mut user = self
            .get_user(athlete_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", athlete_id)))?;

        user.is_subscribed = subscribed;
        user.last_active = format_utc_rfc3339(chrono::Utc::now());
        self.upsert_user(&user).await?;

        tracing::info!(athlete_id, subscribed, "Subscription updated");
        Ok(user)
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get a user's encrypted tokens for one provider.
    pub async fn get_tokens(
        &self,
        provider: Provider,
        athlete_id: u64,
    ) -> Result<Option<UserTokens>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(tokens_collection(provider))
            .obj()
            .one(&athlete_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a user's encrypted tokens for one provider.
    pub async fn set_tokens(
        &self,
        provider: Provider,
        athlete_id: u64,
        tokens: &UserTokens,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(tokens_collection(provider))
            .document_id(athlete_id.to_string())
            .object(tokens)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a user's tokens for one provider.
    pub async fn delete_tokens(&self, provider: Provider, athlete_id: u64) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(tokens_collection(provider))
            .document_id(athlete_id.to_string())
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Soundtrack Operations ───────────────────────────────────

    /// Get the stored soundtrack for an activity.
    pub async fn get_soundtrack(
        &self,
        activity_id: u64,
        athlete_id: u64,
    ) -> Result<Option<SoundtrackRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SOUNDTRACKS)
            .obj()
            .one(&SoundtrackRecord::document_id(activity_id, athlete_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a soundtrack unless one already exists.
    ///
    /// Returns `true` if this call created the document, `false` if another
    /// writer got there first. Existing documents are never overwritten.
    pub async fn create_soundtrack(&self, record: &SoundtrackRecord) -> Result<bool, AppError> {
        let result = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::SOUNDTRACKS)
            .document_id(record.id())
            .object(record)
            .execute::<SoundtrackRecord>()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(firestore::errors::FirestoreError::DataConflictError(e)) => {
                tracing::debug!(
                    athlete_id = record.athlete_id,
                    activity_id = record.activity_id,
                    error = %e,
                    "Soundtrack already exists"
                );
                Ok(false)
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }
}

#[async_trait]
impl SoundtrackStore for FirestoreDb {
    async fn find(
        &self,
        activity_id: u64,
        athlete_id: u64,
    ) -> Result<Option<SoundtrackRecord>, AppError> {
        self.get_soundtrack(activity_id, athlete_id).await
    }

    async fn create(&self, record: &SoundtrackRecord) -> Result<bool, AppError> {
        self.create_soundtrack(record).await
    }
}
