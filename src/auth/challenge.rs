// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in challenges.
//!
//! A challenge is a fresh 32-byte nonce embedded in a fixed message that the
//! wallet signs. At most one challenge is outstanding per authenticator and
//! it is consumed by the first callback that presents it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;

use super::AuthError;

/// Nonce length in bytes (hex-encoded to 64 characters).
pub const NONCE_LEN: usize = 32;

/// Default challenge lifetime.
pub const DEFAULT_CHALLENGE_TTL: std::time::Duration = std::time::Duration::from_secs(120);

const MESSAGE_PREAMBLE: &str = "Sign this message to prove you control this wallet and unlock your data.\n\n\
This request will not trigger a blockchain transaction or cost any gas fees.";

/// The canonical message a wallet signs for `nonce`.
pub fn signing_message(nonce: &str) -> String {
    format!("{MESSAGE_PREAMBLE}\n\nNonce: {nonce}")
}

/// An issued challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthChallenge {
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthChallenge {
    /// Issue a challenge with a nonce from the system CSPRNG.
    pub fn issue(now: DateTime<Utc>, ttl: Duration) -> Result<Self, AuthError> {
        let mut bytes = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| AuthError::Randomness)?;
        Ok(Self {
            nonce: alloy::hex::encode(bytes),
            issued_at: now,
            expires_at: now + ttl,
        })
    }

    pub fn message(&self) -> String {
        signing_message(&self.nonce)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Holder of the single outstanding challenge, tagged with the attempt that
/// issued it.
#[derive(Debug, Default)]
pub struct ChallengeSlot {
    current: Mutex<Option<(u64, AuthChallenge)>>,
}

impl ChallengeSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<(u64, AuthChallenge)>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a challenge for `attempt`, invalidating any previous one.
    pub fn issue(
        &self,
        attempt: u64,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<AuthChallenge, AuthError> {
        let challenge = AuthChallenge::issue(now, ttl)?;
        *self.lock() = Some((attempt, challenge.clone()));
        Ok(challenge)
    }

    /// The outstanding challenge for `attempt`, if still outstanding.
    pub fn current(&self, attempt: u64) -> Option<AuthChallenge> {
        match &*self.lock() {
            Some((owner, challenge)) if *owner == attempt => Some(challenge.clone()),
            _ => None,
        }
    }

    /// Consume the challenge for `attempt`.
    ///
    /// Any callback consumes it, valid or not; a challenge never answers
    /// twice.
    pub fn consume(
        &self,
        attempt: u64,
        nonce: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthChallenge, AuthError> {
        let challenge = {
            let mut slot = self.lock();
            match slot.take() {
                Some((owner, challenge)) if owner == attempt => challenge,
                other => {
                    *slot = other;
                    return Err(AuthError::NoActiveChallenge);
                }
            }
        };

        if challenge.nonce != nonce {
            return Err(AuthError::NonceMismatch);
        }
        if challenge.is_expired_at(now) {
            return Err(AuthError::ChallengeExpired);
        }
        Ok(challenge)
    }

    /// Clear the slot if `attempt` still owns it.
    pub fn clear(&self, attempt: u64) {
        let mut slot = self.lock();
        if matches!(&*slot, Some((owner, _)) if *owner == attempt) {
            *slot = None;
        }
    }
}
