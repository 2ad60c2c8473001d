// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Expiring in-memory store for decrypted payloads.
//!
//! ## Guarantees
//!
//! - Expiry is checked on every read; a read at or after `expires_at`
//!   evicts the entry and returns `None`, whether or not a sweep has run
//! - Every map mutation happens under one mutex, so a read racing a sweep
//!   sees either the live entry or nothing
//! - The store is bounded; inserting past capacity evicts the least recently
//!   used entry
//! - Change events are broadcast while the lock is held, so subscribers see
//!   them in mutation order; sending never waits on a subscriber

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::events::{RemovalReason, StoreEvent};
use super::secret::StoredSecret;
use super::StoreError;
use crate::clock::{Clock, SystemClock};

/// Default maximum number of unlocked entries.
pub const DEFAULT_MAX_ENTRIES: usize = 256;

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Per-entry view in [`StoreStats`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryStats {
    pub identifier: String,
    pub display_name: String,
    pub size_bytes: usize,
    pub remaining_millis: u64,
}

/// Memory accounting snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub count: usize,
    pub total_bytes: usize,
    pub per_entry: Vec<EntryStats>,
}

/// Volatile store of decrypted payloads keyed by record identifier.
pub struct ExpiringSecretStore {
    entries: Mutex<LruCache<String, StoredSecret>>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<StoreEvent>,
}

impl ExpiringSecretStore {
    /// Create a store holding at most `max_entries` payloads.
    pub fn new(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            clock,
            events,
        }
    }

    /// Store backed by the wall clock.
    pub fn with_system_clock(max_entries: usize) -> Self {
        Self::new(max_entries, Arc::new(SystemClock))
    }

    /// Subscribe to insert/remove notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, StoredSecret>> {
        // A panic while holding the lock cannot leave the map half-mutated.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn emit_removed(&self, secret: &StoredSecret, reason: RemovalReason) {
        self.emit(StoreEvent::Removed {
            identifier: secret.identifier.clone(),
            display_name: secret.display_name.clone(),
            reason,
        });
    }

    /// Insert or overwrite a payload. Creation time is recorded as now.
    ///
    /// Identifier and display name each become one virtual path segment, so
    /// empty names, `.`, `..` and names containing `/` are rejected.
    pub fn put(
        &self,
        identifier: impl Into<String>,
        plaintext: Vec<u8>,
        display_name: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let identifier = identifier.into();
        let display_name = display_name.into();
        if !is_path_segment(&identifier) {
            return Err(StoreError::InvalidIdentifier(identifier));
        }
        if !is_path_segment(&display_name) {
            return Err(StoreError::InvalidDisplayName(display_name));
        }
        let secret = StoredSecret::new(
            identifier.clone(),
            display_name.clone(),
            plaintext,
            self.clock.now(),
            expires_at,
        );
        let size = secret.size();

        let mut entries = self.lock();
        let displaced = entries.push(identifier.clone(), secret);

        if let Some((old_id, old)) = displaced {
            if old_id != identifier {
                info!(
                    identifier = %old_id,
                    display_name = %old.display_name,
                    "Capacity reached, evicted least recently used secret"
                );
                self.emit_removed(&old, RemovalReason::Evicted);
            } else if old.display_name != display_name {
                self.emit_removed(&old, RemovalReason::Replaced);
            }
        }

        debug!(
            identifier = %identifier,
            display_name = %display_name,
            size_bytes = size,
            expires_at = %expires_at,
            "Secret stored"
        );
        self.emit(StoreEvent::Inserted {
            identifier,
            display_name,
        });
        Ok(())
    }

    /// Fetch a live payload.
    ///
    /// Returns `None` when absent or expired; an expired entry is evicted
    /// on the spot.
    pub fn get(&self, identifier: &str) -> Option<StoredSecret> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let live = entries
            .get(identifier)
            .map(|secret| (!secret.is_expired_at(now)).then(|| secret.clone()));
        let expired = match live {
            None => return None,
            Some(Some(secret)) => return Some(secret),
            Some(None) => entries.pop(identifier),
        };

        if let Some(secret) = expired {
            debug!(identifier = %identifier, "Secret expired on read");
            self.emit_removed(&secret, RemovalReason::Expired);
        }
        None
    }

    /// Remove an entry. Returns whether one existed.
    pub fn remove(&self, identifier: &str) -> bool {
        let mut entries = self.lock();
        match entries.pop(identifier) {
            Some(secret) => {
                info!(identifier = %identifier, "Secret removed");
                self.emit_removed(&secret, RemovalReason::Removed);
                true
            }
            None => false,
        }
    }

    /// Drop every entry. Returns how many were held.
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let mut count = 0;
        while let Some((_, secret)) = entries.pop_lru() {
            self.emit_removed(&secret, RemovalReason::Cleared);
            count += 1;
        }
        if count > 0 {
            info!(count, "Secret store cleared");
        }
        count
    }

    /// Evict every entry whose expiry has passed. Returns the number evicted.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let keys: Vec<String> = entries
            .iter()
            .filter(|(_, secret)| secret.is_expired_at(now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &keys {
            if let Some(secret) = entries.pop(id) {
                self.emit_removed(&secret, RemovalReason::Expired);
            }
        }
        keys.len()
    }

    /// Live entries and their sizes. Expired entries are purged first.
    pub fn stats(&self) -> StoreStats {
        self.purge_expired();
        let now = self.clock.now();

        let entries = self.lock();
        let per_entry: Vec<EntryStats> = entries
            .iter()
            .map(|(_, secret)| EntryStats {
                identifier: secret.identifier.clone(),
                display_name: secret.display_name.clone(),
                size_bytes: secret.size(),
                remaining_millis: secret.remaining_millis_at(now),
            })
            .collect();

        StoreStats {
            count: per_entry.len(),
            total_bytes: per_entry.iter().map(|e| e.size_bytes).sum(),
            per_entry,
        }
    }

    /// Entries currently held, including expired ones awaiting eviction.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}

fn is_path_segment(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}
