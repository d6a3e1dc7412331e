// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token lifecycle for both linked providers.
//!
//! Tokens live encrypted in Firestore, one collection per provider. Decrypted
//! access tokens are cached in memory per `(provider, athlete)` and refreshed
//! shortly before they expire.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Provider, UserTokens};
use crate::services::kms::{encrypt_tokens, KmsService};
use crate::services::soundtrack::TokenSource;
use crate::services::{SpotifyClient, StravaClient};
use crate::time_utils::format_utc_rfc3339;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Cached access token with expiry information.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    fn usable_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Cache key: one entry per provider per athlete.
pub type TokenKey = (Provider, u64);

/// Shared token cache type for use in AppState.
pub type TokenCache = Arc<DashMap<TokenKey, CachedToken>>;

/// Shared refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<TokenKey, Arc<Mutex<()>>>>;

/// Freshly issued tokens from an OAuth exchange.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub scopes: Vec<String>,
}

/// Result of a provider refresh call.
struct Refreshed {
    access_token: String,
    /// `None` when the provider kept the old refresh token valid.
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
}

/// Token manager for Strava and Spotify.
#[derive(Clone)]
pub struct TokenService {
    db: FirestoreDb,
    kms: KmsService,
    strava: StravaClient,
    spotify: SpotifyClient,
    /// In-memory cache of decrypted access tokens (shared across requests).
    token_cache: TokenCache,
    /// Per-key mutex to serialize refreshes.
    refresh_locks: RefreshLocks,
}

impl TokenService {
    pub fn new(
        db: FirestoreDb,
        kms: KmsService,
        strava: StravaClient,
        spotify: SpotifyClient,
        token_cache: TokenCache,
        refresh_locks: RefreshLocks,
    ) -> Self {
        Self {
            db,
            kms,
            strava,
            spotify,
            token_cache,
            refresh_locks,
        }
    }

    /// Get a valid (non-expired) access token for the given athlete.
    ///
    /// 1. Check in-memory cache
    /// 2. Acquire the per-key refresh lock and re-check the cache
    /// 3. Load from Firestore and decrypt the access token only
    /// 4. If expiring, decrypt the refresh token and refresh with the provider
    /// 5. If the provider says `invalid_grant`, another instance already
    ///    rotated the refresh token; reload its result from Firestore
    pub async fn get_valid_access_token(
        &self,
        provider: Provider,
        athlete_id: u64,
    ) -> Result<String, AppError> {
        let key = (provider, athlete_id);
        let now = Utc::now();

        if let Some(cached) = self.token_cache.get(&key) {
            if cached.usable_at(now) {
                return Ok(cached.access_token.clone());
            }
        }

        let lock = self
            .refresh_locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        if let Some(cached) = self.token_cache.get(&key) {
            if cached.usable_at(now) {
                return Ok(cached.access_token.clone());
            }
        }

        let aad = provider.token_aad(athlete_id);
        let tokens = self.load_tokens(provider, athlete_id).await?;

        let access_token = self
            .kms
            .decrypt_with_fallback(&tokens.access_token_encrypted, Some(aad.as_bytes()))
            .await?;
        let expires_at = parse_expiry(&tokens.expires_at)?;

        let cached = CachedToken::new(access_token, expires_at);
        if cached.usable_at(now) {
            self.token_cache.insert(key, cached.clone());
            return Ok(cached.access_token);
        }

        tracing::info!(athlete_id, %provider, "Access token expired, refreshing");

        let refresh_token = self
            .kms
            .decrypt_with_fallback(&tokens.refresh_token_encrypted, Some(aad.as_bytes()))
            .await?;

        let refreshed = match self.refresh_with_provider(provider, &refresh_token).await {
            Ok(r) => r,
            Err(ref e) if is_invalid_grant(e) => {
                tracing::info!(
                    athlete_id,
                    %provider,
                    "Refresh token race detected, loading the winner's tokens"
                );
                return self.fetch_and_cache_from_db(provider, athlete_id).await;
            }
            Err(e) => return Err(e),
        };

        let refresh_token = refreshed.refresh_token.unwrap_or(refresh_token);
        let (enc_access, enc_refresh) =
            encrypt_tokens(&self.kms, &refreshed.access_token, &refresh_token, &aad).await?;

        let updated = UserTokens {
            access_token_encrypted: enc_access,
            refresh_token_encrypted: enc_refresh,
            expires_at: format_utc_rfc3339(refreshed.expires_at),
            scopes: tokens.scopes,
        };
        self.db.set_tokens(provider, athlete_id, &updated).await?;

        self.token_cache.insert(
            key,
            CachedToken::new(refreshed.access_token.clone(), refreshed.expires_at),
        );

        tracing::info!(athlete_id, %provider, "Token refreshed and cached");
        Ok(refreshed.access_token)
    }

    async fn refresh_with_provider(
        &self,
        provider: Provider,
        refresh_token: &str,
    ) -> Result<Refreshed, AppError> {
        match provider {
            Provider::Strava => {
                let r = self.strava.refresh_token(refresh_token).await?;
                Ok(Refreshed {
                    access_token: r.access_token,
                    refresh_token: Some(r.refresh_token),
                    expires_at: DateTime::from_timestamp(r.expires_at, 0).unwrap_or_default(),
                })
            }
            Provider::Spotify => {
                let r = self.spotify.refresh_token(refresh_token).await?;
                Ok(Refreshed {
                    access_token: r.access_token,
                    refresh_token: r.refresh_token,
                    expires_at: Utc::now() + Duration::seconds(r.expires_in),
                })
            }
        }
    }

    async fn load_tokens(
        &self,
        provider: Provider,
        athlete_id: u64,
    ) -> Result<UserTokens, AppError> {
        self.db
            .get_tokens(provider, athlete_id)
            .await?
            .ok_or(AppError::NotLinked(provider))
    }

    /// Reload tokens another instance just refreshed, and cache them.
    async fn fetch_and_cache_from_db(
        &self,
        provider: Provider,
        athlete_id: u64,
    ) -> Result<String, AppError> {
        let tokens = self.load_tokens(provider, athlete_id).await?;
        let aad = provider.token_aad(athlete_id);

        let access_token = self
            .kms
            .decrypt_with_fallback(&tokens.access_token_encrypted, Some(aad.as_bytes()))
            .await?;
        let expires_at = parse_expiry(&tokens.expires_at)?;

        self.token_cache.insert(
            (provider, athlete_id),
            CachedToken::new(access_token.clone(), expires_at),
        );

        Ok(access_token)
    }

    /// Encrypt and store tokens from an OAuth exchange, replacing any
    /// previous grant.
    pub async fn store_tokens(
        &self,
        provider: Provider,
        athlete_id: u64,
        grant: &TokenGrant,
    ) -> Result<(), AppError> {
        let aad = provider.token_aad(athlete_id);
        let (enc_access, enc_refresh) =
            encrypt_tokens(&self.kms, &grant.access_token, &grant.refresh_token, &aad).await?;

        let tokens = UserTokens {
            access_token_encrypted: enc_access,
            refresh_token_encrypted: enc_refresh,
            expires_at: format_utc_rfc3339(grant.expires_at),
            scopes: grant.scopes.clone(),
        };
        self.db.set_tokens(provider, athlete_id, &tokens).await?;

        self.token_cache.insert(
            (provider, athlete_id),
            CachedToken::new(grant.access_token.clone(), grant.expires_at),
        );

        tracing::info!(athlete_id, %provider, "Tokens stored");
        Ok(())
    }

    /// True if the athlete has linked this provider.
    pub async fn is_linked(&self, provider: Provider, athlete_id: u64) -> Result<bool, AppError> {
        if self.token_cache.contains_key(&(provider, athlete_id)) {
            return Ok(true);
        }
        Ok(self.db.get_tokens(provider, athlete_id).await?.is_some())
    }

    /// Forget the athlete's tokens for this provider.
    pub async fn revoke(&self, provider: Provider, athlete_id: u64) -> Result<(), AppError> {
        self.token_cache.remove(&(provider, athlete_id));
        self.db.delete_tokens(provider, athlete_id).await?;
        tracing::info!(athlete_id, %provider, "Tokens revoked");
        Ok(())
    }
}

#[async_trait]
impl TokenSource for TokenService {
    async fn fitness_token(&self, athlete_id: u64) -> Result<String, AppError> {
        self.get_valid_access_token(Provider::Strava, athlete_id).await
    }

    async fn music_token(&self, athlete_id: u64) -> Result<String, AppError> {
        self.get_valid_access_token(Provider::Spotify, athlete_id).await
    }
}

fn parse_expiry(expires_at: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(expires_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to parse expiry: {}", e)))
}

fn is_invalid_grant(e: &AppError) -> bool {
    matches!(
        e,
        AppError::StravaApi(msg) | AppError::SpotifyApi(msg) if msg.contains("invalid_grant")
    )
}
