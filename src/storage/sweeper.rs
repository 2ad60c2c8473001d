// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Expiry Sweeper
//!
//! Background task that periodically evicts expired secrets so plaintext
//! does not linger until the next read. Reads enforce expiry on their own;
//! the sweep only compacts.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ExpiringSecretStore;

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Periodic expiry sweep over an [`ExpiringSecretStore`].
pub struct SecretSweeper {
    store: Arc<ExpiringSecretStore>,
    interval: Duration,
}

impl SecretSweeper {
    pub fn new(store: Arc<ExpiringSecretStore>) -> Self {
        Self {
            store,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Override the sweep interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Secret sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Secret sweeper shutting down");
                return;
            }

            self.sweep_once();

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Secret sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// One pass. Returns how many entries were evicted.
    pub fn sweep_once(&self) -> usize {
        let evicted = self.store.purge_expired();
        if evicted > 0 {
            info!(evicted, remaining = self.store.len(), "Swept expired secrets");
        } else {
            debug!("Sweep found nothing to evict");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use chrono::Duration as ChronoDuration;

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_interval() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(ExpiringSecretStore::new(16, clock.clone()));
        let expires = clock.now() + ChronoDuration::seconds(1);
        store.put("7", b"x".to_vec(), "data.csv", expires).unwrap();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(SecretSweeper::new(store.clone()).run(shutdown.clone()));

        // First pass runs immediately and finds nothing expired.
        tokio::time::sleep(Duration::from_secs(1)).await;
        clock.advance(ChronoDuration::seconds(2));
        assert_eq!(store.len(), 1, "no read and no sweep yet");

        tokio::time::sleep(DEFAULT_SWEEP_INTERVAL).await;
        assert_eq!(store.len(), 0);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stops_when_cancelled_before_start() {
        let store = Arc::new(ExpiringSecretStore::with_system_clock(4));
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        SecretSweeper::new(store)
            .with_interval(Duration::from_millis(10))
            .run(shutdown)
            .await;
    }

    #[test]
    fn sweep_once_reports_evictions() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(ExpiringSecretStore::new(16, clock.clone()));
        store.put("1", b"x".to_vec(), "a", clock.now() + ChronoDuration::milliseconds(10)).unwrap();
        store.put("2", b"x".to_vec(), "b", clock.now() + ChronoDuration::seconds(10)).unwrap();
        clock.advance(ChronoDuration::seconds(1));

        let sweeper = SecretSweeper::new(store.clone());
        assert_eq!(sweeper.sweep_once(), 1);
        assert_eq!(sweeper.sweep_once(), 0);
        assert_eq!(store.len(), 1);
    }
}
