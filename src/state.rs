// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::auth::{AuthError, ChallengeAuthenticator, SessionManager, WalletSession};
use crate::backend::AccessBackend;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::crypto::TokenCodec;
use crate::storage::{ExpiringSecretStore, SecretSweeper};
use crate::unlock::UnlockService;
use crate::vfs::ReadOnlyVirtualFs;

/// Shared components for one running vault.
#[derive(Clone)]
pub struct VaultContext {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<ExpiringSecretStore>,
    pub vfs: ReadOnlyVirtualFs,
    pub authenticator: Arc<ChallengeAuthenticator>,
    pub sessions: Arc<SessionManager>,
    pub codec: Arc<TokenCodec>,
}

impl VaultContext {
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(ExpiringSecretStore::new(config.max_entries, clock.clone()));
        Self {
            vfs: ReadOnlyVirtualFs::new(store.clone()),
            authenticator: Arc::new(ChallengeAuthenticator::new(
                config.authenticator(),
                clock.clone(),
            )),
            sessions: Arc::new(SessionManager::new(clock.clone(), config.session_max_age)),
            codec: Arc::new(TokenCodec::default()),
            store,
            clock,
            config,
        }
    }

    pub fn from_config(config: Config) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn sweeper(&self) -> SecretSweeper {
        SecretSweeper::new(self.store.clone()).with_interval(self.config.sweep_interval)
    }

    pub fn unlock_service<B: AccessBackend>(&self, backend: B) -> UnlockService<B> {
        UnlockService::new(
            backend,
            self.codec.clone(),
            self.store.clone(),
            self.sessions.clone(),
            self.config.unlock_duration,
        )
    }

    /// Prove wallet ownership and establish a session.
    pub async fn sign_in(&self, shutdown: &CancellationToken) -> Result<WalletSession, AuthError> {
        let identity = self.authenticator.authenticate(shutdown).await?;
        Ok(self.sessions.establish(&identity))
    }

    /// Drop the session and every unlocked record. Returns the number of
    /// records removed.
    pub fn sign_out(&self) -> usize {
        self.authenticator.cancel();
        self.sessions.disconnect();
        let cleared = self.store.clear();
        info!(cleared, "Signed out");
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::VerifiedIdentity;
    use crate::clock::ManualClock;
    use alloy::primitives::Address;

    #[test]
    fn wires_components_from_config() {
        let config = Config {
            max_entries: 3,
            ..Config::default()
        };
        let clock = Arc::new(ManualClock::default());
        let ctx = VaultContext::new(config, clock.clone());

        assert_eq!(ctx.store.capacity(), 3);
        assert_eq!(
            ctx.authenticator.config().port_range,
            ctx.config.callback_ports
        );

        let expires = clock.now() + chrono::Duration::minutes(5);
        ctx.store.put("7", b"x".to_vec(), "data.csv", expires).unwrap();
        assert!(ctx.vfs.read("memvault:/7/data.csv").is_ok());
    }

    #[test]
    fn sign_out_clears_session_and_records() {
        let clock = Arc::new(ManualClock::default());
        let ctx = VaultContext::new(Config::default(), clock.clone());
        ctx.sessions.establish(&VerifiedIdentity {
            address: Address::repeat_byte(1),
            signature: "0xsig".to_string(),
            verified_at: clock.now(),
        });
        let expires = clock.now() + chrono::Duration::hours(1);
        ctx.store.put("1", b"a".to_vec(), "a.csv", expires).unwrap();

        assert_eq!(ctx.sign_out(), 1);
        assert!(ctx.sessions.current().is_none());
        assert!(ctx.store.is_empty());
    }
}
