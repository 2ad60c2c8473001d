// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Record unlock orchestration.
//!
//! Unlocking a record requires a proven wallet session. The backend is
//! asked for the record's key material, the ciphertext is downloaded,
//! decoded on a blocking worker, and the plaintext is placed in the store
//! for the configured unlock window. Nothing is written to disk.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::SessionManager;
use crate::backend::{AccessBackend, BackendError};
use crate::crypto::{TokenCodec, TokenError};
use crate::storage::{ExpiringSecretStore, StoreError};
use crate::vfs::{VfsError, VirtualPath};

/// Default unlock window.
pub const DEFAULT_UNLOCK_DURATION: Duration = Duration::from_secs(3600);

#[derive(Debug, thiserror::Error)]
pub enum UnlockError {
    #[error("no verified wallet session")]
    NotAuthenticated,

    #[error("record cannot be exposed under this name: {0}")]
    InvalidName(#[from] VfsError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to decode record: {0}")]
    Decode(#[from] TokenError),

    #[error("decode worker failed: {0}")]
    Worker(String),
}

impl UnlockError {
    /// Message suitable for showing to the user.
    ///
    /// Identity problems ask for a wallet reconnect; access and content
    /// problems ask for re-verification or a fresh download.
    pub fn user_message(&self) -> String {
        match self {
            UnlockError::NotAuthenticated => {
                "Your wallet is not verified. Reconnect your wallet and sign the request."
                    .to_string()
            }
            UnlockError::InvalidName(_) | UnlockError::Store(_) => {
                "This record has an invalid file name and cannot be opened.".to_string()
            }
            UnlockError::Backend(BackendError::AccessDenied(reason)) => {
                format!("Access denied: {reason}. Re-verify your access to this record.")
            }
            UnlockError::Backend(_) => {
                "The access service could not be reached. Check your connection and try again."
                    .to_string()
            }
            UnlockError::Decode(TokenError::KeyLengthInvalid { .. })
            | UnlockError::Decode(TokenError::KeyEncodingInvalid(_)) => {
                "The access key for this record is invalid. Re-verify your access.".to_string()
            }
            UnlockError::Decode(TokenError::AuthenticationFailed) => {
                "The downloaded content failed its integrity check. Re-verify access and download it again."
                    .to_string()
            }
            UnlockError::Decode(_) => {
                "The content could not be decrypted. Re-verify access and download it again."
                    .to_string()
            }
            UnlockError::Worker(_) => "Decryption was interrupted. Try again.".to_string(),
        }
    }
}

/// Summary of a completed unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedRecord {
    pub identifier: String,
    pub display_name: String,
    pub uri: String,
    pub size_bytes: usize,
    pub expires_at: DateTime<Utc>,
}

pub struct UnlockService<B> {
    backend: B,
    codec: Arc<TokenCodec>,
    store: Arc<ExpiringSecretStore>,
    sessions: Arc<SessionManager>,
    unlock_duration: chrono::Duration,
}

impl<B: AccessBackend> UnlockService<B> {
    pub fn new(
        backend: B,
        codec: Arc<TokenCodec>,
        store: Arc<ExpiringSecretStore>,
        sessions: Arc<SessionManager>,
        unlock_duration: Duration,
    ) -> Self {
        Self {
            backend,
            codec,
            store,
            sessions,
            unlock_duration: chrono::Duration::from_std(unlock_duration)
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    pub async fn unlock(
        &self,
        record_id: &str,
        display_name: &str,
    ) -> Result<UnlockedRecord, UnlockError> {
        let wallet = self
            .sessions
            .proven_address()
            .ok_or(UnlockError::NotAuthenticated)?;

        let path = VirtualPath::file(record_id, display_name);
        if VirtualPath::parse(&path.to_path_string())? != path {
            return Err(VfsError::InvalidAddress(path.to_uri()).into());
        }

        let grant = self.backend.verify_access(record_id, &wallet).await?;
        let ciphertext = self.backend.fetch_content(&grant.content_address).await?;

        let codec = self.codec.clone();
        let key = grant.key_material;
        let plaintext = tokio::task::spawn_blocking(move || {
            codec.decode_with_encoded_key(&ciphertext, &key)
        })
        .await
        .map_err(|e| UnlockError::Worker(e.to_string()))?
        .inspect_err(|e| {
            warn!(
                record_id,
                error = %e,
                error_code = e.error_code(),
                "Record decode failed"
            )
        })?;

        let size_bytes = plaintext.len();
        let expires_at = self.store.clock().now() + self.unlock_duration;
        self.store
            .put(record_id, plaintext, display_name, expires_at)?;

        info!(record_id, display_name, size_bytes, %expires_at, "Record unlocked");
        Ok(UnlockedRecord {
            identifier: record_id.to_string(),
            display_name: display_name.to_string(),
            uri: path.to_uri(),
            size_bytes,
            expires_at,
        })
    }

    /// Remove one unlocked record. Returns whether it was present.
    pub fn lock(&self, record_id: &str) -> bool {
        let removed = self.store.remove(record_id);
        if removed {
            info!(record_id, "Record locked");
        }
        removed
    }

    /// Remove every unlocked record.
    pub fn lock_all(&self) -> usize {
        let count = self.store.clear();
        info!(count, "All records locked");
        count
    }
}
