// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud KMS service for encrypting/decrypting OAuth tokens.
//!
//! Uses direct KMS encryption (not envelope encryption). Every token is bound
//! to its provider and athlete through additional authenticated data (AAD),
//! so a ciphertext copied onto another user's document will not decrypt.

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// KMS encryption service.
#[derive(Clone)]
pub struct KmsService {
    /// Full resource path to the KMS key
    /// Format: projects/{project}/locations/{location}/keyRings/{ring}/cryptoKeys/{key}
    key_path: String,

    /// GCP KMS client (`None` in offline mock mode)
    client: Option<std::sync::Arc<google_cloud_kms::client::Client>>,
}

#[cfg(debug_assertions)]
const MOCK_AAD_PREFIX: &str = "AAD:";
#[cfg(debug_assertions)]
const MOCK_NO_AAD_PREFIX: &str = "NOAAD:";

impl KmsService {
    /// KMS Key Ring Name
    const KEY_RING_NAME: &str = "moovit";

    /// Connect to GCP KMS.
    pub async fn new(project_id: &str, location: &str, key_name: &str) -> Result<Self, AppError> {
        let key_path = format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            project_id,
            location,
            Self::KEY_RING_NAME,
            key_name
        );

        let config = google_cloud_kms::client::ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS auth config: {}", e))
            })?;

        let client = google_cloud_kms::client::Client::new(config)
            .await
            .map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to create KMS client: {}", e))
            })?;

        tracing::info!(key_path = %key_path, "KMS client connected");

        Ok(Self {
            key_path,
            client: Some(std::sync::Arc::new(client)),
        })
    }

    /// Create a mock KMS service for testing (offline mode).
    ///
    /// The mock only base64-encodes, tagging the payload with its AAD so
    /// mismatches are still rejected. Only available in debug/test builds.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self {
            key_path: "projects/mock/locations/mock/keyRings/mock/cryptoKeys/mock".to_string(),
            client: None,
        }
    }

    fn client(&self) -> Result<&google_cloud_kms::client::Client, AppError> {
        self.client
            .as_deref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("KMS client not connected")))
    }

    /// Encrypt plaintext, optionally bound to `aad`.
    /// Returns base64-encoded ciphertext.
    pub async fn encrypt(&self, plaintext: &str, aad: Option<&[u8]>) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::EncryptRequest;

        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                return Ok(mock_encrypt(plaintext, aad));
            }
        }

        // Release builds never fall back to the mock.
        let client = self.client()?;

        let req = EncryptRequest {
            name: self.key_path.clone(),
            plaintext: plaintext.as_bytes().to_vec(),
            additional_authenticated_data: aad.map(<[u8]>::to_vec).unwrap_or_default(),
            ..Default::default()
        };

        let response = client
            .encrypt(req, None)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS encrypt failed: {}", e)))?;

        Ok(BASE64.encode(response.ciphertext))
    }

    /// Decrypt base64-encoded ciphertext that was encrypted with exactly `aad`.
    pub async fn decrypt(
        &self,
        ciphertext_b64: &str,
        aad: Option<&[u8]>,
    ) -> Result<String, AppError> {
        use google_cloud_googleapis::cloud::kms::v1::DecryptRequest;

        #[cfg(debug_assertions)]
        {
            if self.client.is_none() {
                return mock_decrypt(ciphertext_b64, aad);
            }
        }

        let client = self.client()?;

        let ciphertext = BASE64.decode(ciphertext_b64).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Base64 ciphertext decode failed: {}", e))
        })?;

        let req = DecryptRequest {
            name: self.key_path.clone(),
            ciphertext,
            additional_authenticated_data: aad.map(<[u8]>::to_vec).unwrap_or_default(),
            ..Default::default()
        };

        let response = client
            .decrypt(req, None)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("KMS decrypt failed: {}", e)))?;

        String::from_utf8(response.plaintext)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed: {}", e)))
    }

    /// Decrypt with `aad`, falling back to no AAD for tokens written before
    /// AAD binding was introduced.
    pub async fn decrypt_with_fallback(
        &self,
        ciphertext_b64: &str,
        aad: Option<&[u8]>,
    ) -> Result<String, AppError> {
        match self.decrypt(ciphertext_b64, aad).await {
            Ok(plaintext) => Ok(plaintext),
            Err(e) if aad.is_some() => {
                tracing::debug!(error = %e, "AAD decrypt failed, retrying without AAD");
                self.decrypt(ciphertext_b64, None).await
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(debug_assertions)]
fn mock_encrypt(plaintext: &str, aad: Option<&[u8]>) -> String {
    let tagged = match aad {
        Some(aad) => format!(
            "{}{}:{}",
            MOCK_AAD_PREFIX,
            BASE64.encode(aad),
            BASE64.encode(plaintext)
        ),
        None => format!("{}{}", MOCK_NO_AAD_PREFIX, BASE64.encode(plaintext)),
    };
    BASE64.encode(tagged)
}

#[cfg(debug_assertions)]
fn mock_decrypt(ciphertext_b64: &str, aad: Option<&[u8]>) -> Result<String, AppError> {
    let mock_err = |msg: &str| AppError::Internal(anyhow::anyhow!("Mock decrypt failed: {}", msg));
    let decode_utf8 = |b64: &str| -> Result<String, AppError> {
        let bytes = BASE64.decode(b64).map_err(|_| mock_err("bad base64"))?;
        String::from_utf8(bytes).map_err(|_| mock_err("bad utf-8"))
    };

    let tagged = decode_utf8(ciphertext_b64)?;

    if let Some(rest) = tagged.strip_prefix(MOCK_AAD_PREFIX) {
        let (aad_b64, body_b64) = rest.split_once(':').ok_or_else(|| mock_err("bad tag"))?;
        let stored_aad = BASE64.decode(aad_b64).map_err(|_| mock_err("bad aad"))?;
        return match aad {
            Some(expected) if expected == stored_aad.as_slice() => decode_utf8(body_b64),
            _ => Err(mock_err("AAD mismatch")),
        };
    }

    if aad.is_some() {
        return Err(mock_err("ciphertext has no AAD"));
    }

    match tagged.strip_prefix(MOCK_NO_AAD_PREFIX) {
        Some(body_b64) => decode_utf8(body_b64),
        // Untagged: plain base64 from before the mock tagged payloads.
        None => Ok(tagged),
    }
}

/// Encrypt an access/refresh token pair with the same AAD.
pub async fn encrypt_tokens(
    kms: &KmsService,
    access_token: &str,
    refresh_token: &str,
    aad: &str,
) -> Result<(String, String), AppError> {
    let aad = Some(aad.as_bytes());
    let encrypted_access = kms.encrypt(access_token, aad).await?;
    let encrypted_refresh = kms.encrypt(refresh_token, aad).await?;
    Ok((encrypted_access, encrypted_refresh))
}
