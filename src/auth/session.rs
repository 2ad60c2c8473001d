// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet sessions.
//!
//! A session is only ever established from a [`VerifiedIdentity`]. A
//! persisted copy can be restored across restarts until it exceeds the
//! configured maximum age.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy::primitives::Address;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::Clock;

/// Default maximum age of a persisted session.
pub const DEFAULT_SESSION_MAX_AGE: std::time::Duration = std::time::Duration::from_secs(86_400);

/// Outcome of a successful challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub address: Address,
    pub signature: String,
    pub verified_at: DateTime<Utc>,
}

/// The connected wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSession {
    pub address: String,
    pub connected_at: DateTime<Utc>,
    pub proven: bool,
}

/// Session form written to disk by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub address: String,
    pub connected_at: DateTime<Utc>,
    pub last_verified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl PersistedSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.last_verified_at > max_age
    }
}

#[derive(Debug, Clone)]
struct SessionRecord {
    session: WalletSession,
    last_verified_at: DateTime<Utc>,
    signature: Option<String>,
}

/// Tracks the current wallet session.
pub struct SessionManager {
    current: Mutex<Option<SessionRecord>>,
    clock: Arc<dyn Clock>,
    max_age: Duration,
}

impl SessionManager {
    pub fn new(clock: Arc<dyn Clock>, max_age: std::time::Duration) -> Self {
        Self {
            current: Mutex::new(None),
            clock,
            max_age: Duration::from_std(max_age).unwrap_or(Duration::MAX),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<SessionRecord>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Establish a proven session from a verified challenge.
    pub fn establish(&self, identity: &VerifiedIdentity) -> WalletSession {
        let session = WalletSession {
            address: identity.address.to_string(),
            connected_at: identity.verified_at,
            proven: true,
        };
        *self.lock() = Some(SessionRecord {
            session: session.clone(),
            last_verified_at: identity.verified_at,
            signature: Some(identity.signature.clone()),
        });
        info!(address = %session.address, "Wallet session established");
        session
    }

    pub fn current(&self) -> Option<WalletSession> {
        self.lock().as_ref().map(|record| record.session.clone())
    }

    /// Address of the current session, if it is proven.
    pub fn proven_address(&self) -> Option<String> {
        self.lock()
            .as_ref()
            .filter(|record| record.session.proven)
            .map(|record| record.session.address.clone())
    }

    /// Drop the current session. Returns whether one existed.
    pub fn disconnect(&self) -> bool {
        let existed = self.lock().take().is_some();
        if existed {
            info!("Wallet session disconnected");
        }
        existed
    }

    pub fn to_persisted(&self) -> Option<PersistedSession> {
        self.lock().as_ref().map(|record| PersistedSession {
            address: record.session.address.clone(),
            connected_at: record.session.connected_at,
            last_verified_at: record.last_verified_at,
            signature: record.signature.clone(),
        })
    }

    /// Restore a persisted session.
    ///
    /// Expired copies are discarded and clear any current session. A
    /// restored session is proven only if it carries the signature it was
    /// verified with.
    pub fn restore(&self, persisted: PersistedSession) -> Option<WalletSession> {
        let now = self.clock.now();
        if persisted.is_expired_at(now, self.max_age) {
            debug!(address = %persisted.address, "Persisted session expired, discarding");
            *self.lock() = None;
            return None;
        }

        let session = WalletSession {
            address: persisted.address,
            connected_at: persisted.connected_at,
            proven: persisted.signature.is_some(),
        };
        *self.lock() = Some(SessionRecord {
            session: session.clone(),
            last_verified_at: persisted.last_verified_at,
            signature: persisted.signature,
        });
        Some(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn identity(at: DateTime<Utc>) -> VerifiedIdentity {
        VerifiedIdentity {
            address: Address::repeat_byte(0x11),
            signature: "0xsig".to_string(),
            verified_at: at,
        }
    }

    fn manager(clock: Arc<ManualClock>) -> SessionManager {
        SessionManager::new(clock, std::time::Duration::from_secs(3600))
    }

    #[test]
    fn establish_creates_proven_session() {
        let clock = Arc::new(ManualClock::default());
        let sessions = manager(clock.clone());
        assert!(sessions.proven_address().is_none());

        let session = sessions.establish(&identity(clock.now()));
        assert!(session.proven);
        assert_eq!(sessions.proven_address(), Some(session.address));
        assert!(sessions.disconnect());
        assert!(!sessions.disconnect());
    }

    #[test]
    fn persisted_round_trip_within_max_age() {
        let clock = Arc::new(ManualClock::default());
        let sessions = manager(clock.clone());
        sessions.establish(&identity(clock.now()));
        let persisted = sessions.to_persisted().unwrap();

        let json = serde_json::to_value(&persisted).unwrap();
        assert!(json.get("lastVerifiedAt").is_some());

        let restored_into = manager(clock.clone());
        clock.advance(Duration::minutes(30));
        let session = restored_into.restore(persisted).unwrap();
        assert!(session.proven);
    }

    #[test]
    fn expired_persisted_session_is_cleared() {
        let clock = Arc::new(ManualClock::default());
        let sessions = manager(clock.clone());
        sessions.establish(&identity(clock.now()));
        let persisted = sessions.to_persisted().unwrap();

        clock.advance(Duration::hours(2));
        assert!(sessions.restore(persisted).is_none());
        assert!(sessions.current().is_none());
    }

    #[test]
    fn unsigned_persisted_session_is_not_proven() {
        let clock = Arc::new(ManualClock::default());
        let sessions = manager(clock.clone());
        let session = sessions
            .restore(PersistedSession {
                address: Address::repeat_byte(0x22).to_string(),
                connected_at: clock.now(),
                last_verified_at: clock.now(),
                signature: None,
            })
            .unwrap();
        assert!(!session.proven);
        assert!(sessions.proven_address().is_none());
    }
}
