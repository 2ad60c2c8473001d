// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Challenge-response wallet authentication over a loopback listener.
//!
//! Each call to [`ChallengeAuthenticator::authenticate`] issues a challenge,
//! binds the first free port in the configured range on 127.0.0.1, and waits
//! for exactly one of: a callback, the challenge timer, caller cancellation,
//! or a newer call superseding it. The listener is always shut down and its
//! port released before the call returns, including when the future is
//! dropped.

use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::challenge::DEFAULT_CHALLENGE_TTL;
use super::{callback_router, AuthError, CallbackState, ChallengeSlot, VerifiedIdentity};
use crate::clock::Clock;

/// Default callback port range.
pub const DEFAULT_CALLBACK_PORTS: RangeInclusive<u16> = 52370..=52389;

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const PHASE_EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct AuthenticatorConfig {
    pub port_range: RangeInclusive<u16>,
    pub challenge_ttl: Duration,
    /// How long in-flight requests may drain before the listener is aborted.
    pub shutdown_grace: Duration,
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        Self {
            port_range: DEFAULT_CALLBACK_PORTS,
            challenge_ttl: DEFAULT_CHALLENGE_TTL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Observable authentication phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum AuthPhase {
    Idle,
    ChallengeIssued { nonce: String },
    ListenerActive { port: u16 },
    AwaitingCallback { callback_url: String, nonce: String },
    Verified { address: String },
    Rejected { reason: String },
    TimedOut,
    Cancelled,
}

struct ActiveAttempt {
    id: u64,
    cancel: CancellationToken,
    superseded: CancellationToken,
}

/// Drives sign-in attempts. At most one attempt is active at a time.
pub struct ChallengeAuthenticator {
    config: AuthenticatorConfig,
    clock: Arc<dyn Clock>,
    challenges: Arc<ChallengeSlot>,
    active: Mutex<Option<ActiveAttempt>>,
    next_attempt: AtomicU64,
    phase: watch::Sender<AuthPhase>,
    transitions: broadcast::Sender<AuthPhase>,
}

impl ChallengeAuthenticator {
    pub fn new(config: AuthenticatorConfig, clock: Arc<dyn Clock>) -> Self {
        let (phase, _) = watch::channel(AuthPhase::Idle);
        let (transitions, _) = broadcast::channel(PHASE_EVENT_CAPACITY);
        Self {
            config,
            clock,
            challenges: Arc::new(ChallengeSlot::new()),
            active: Mutex::new(None),
            next_attempt: AtomicU64::new(0),
            phase,
            transitions,
        }
    }

    pub fn config(&self) -> &AuthenticatorConfig {
        &self.config
    }

    /// Watch the current phase. Only the latest value is retained, so a
    /// terminal phase may be replaced by `Idle` before a watcher wakes.
    pub fn subscribe(&self) -> watch::Receiver<AuthPhase> {
        self.phase.subscribe()
    }

    /// Every phase transition in order, terminal phases included.
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<AuthPhase> {
        self.transitions.subscribe()
    }

    pub fn phase(&self) -> AuthPhase {
        self.phase.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.lock_active().is_some()
    }

    /// Cancel the active attempt. Safe to call repeatedly or when nothing is
    /// running; returns whether an attempt was signalled.
    pub fn cancel(&self) -> bool {
        match &*self.lock_active() {
            Some(active) if !active.cancel.is_cancelled() => {
                active.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Run one sign-in attempt to completion.
    ///
    /// Cancelling `shutdown` cancels the attempt. Starting another attempt
    /// while this one is waiting ends this one with `Superseded`.
    pub async fn authenticate(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<VerifiedIdentity, AuthError> {
        let attempt = self.next_attempt.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = shutdown.child_token();
        let superseded = CancellationToken::new();

        let previous = self.lock_active().replace(ActiveAttempt {
            id: attempt,
            cancel: cancel.clone(),
            superseded: superseded.clone(),
        });
        if let Some(previous) = previous {
            info!(previous = previous.id, attempt, "Superseding outstanding authentication");
            previous.superseded.cancel();
        }

        let mut guard = AttemptGuard {
            authenticator: self,
            attempt,
            listener: None,
        };
        let outcome = self
            .run_attempt(attempt, &cancel, &superseded, &mut guard)
            .await;
        guard.close_listener(self.config.shutdown_grace).await;
        self.finish(attempt, &outcome);
        outcome
    }

    async fn run_attempt(
        &self,
        attempt: u64,
        cancel: &CancellationToken,
        superseded: &CancellationToken,
        guard: &mut AttemptGuard<'_>,
    ) -> Result<VerifiedIdentity, AuthError> {
        let deadline = Instant::now() + self.config.challenge_ttl;
        let ttl = chrono::Duration::from_std(self.config.challenge_ttl)
            .unwrap_or(chrono::Duration::MAX);
        let challenge = self.challenges.issue(attempt, self.clock.now(), ttl)?;
        self.publish(
            attempt,
            AuthPhase::ChallengeIssued {
                nonce: challenge.nonce.clone(),
            },
        );

        let listener = bind_loopback(&self.config.port_range).await?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::Listener(e.to_string()))?
            .port();
        self.publish(attempt, AuthPhase::ListenerActive { port });

        let (state, outcome) =
            CallbackState::new(attempt, self.challenges.clone(), self.clock.clone());
        guard.listener = Some(spawn_listener(listener, state));

        let callback_url = format!("http://{}:{port}/", Ipv4Addr::LOCALHOST);
        info!(%callback_url, "Waiting for wallet signature");
        self.publish(
            attempt,
            AuthPhase::AwaitingCallback {
                callback_url,
                nonce: challenge.nonce,
            },
        );

        tokio::select! {
            biased;
            result = outcome => result.unwrap_or_else(|_| {
                Err(AuthError::Listener("callback channel closed".to_string()))
            }),
            _ = cancel.cancelled() => Err(AuthError::Cancelled),
            _ = superseded.cancelled() => Err(AuthError::Superseded),
            _ = tokio::time::sleep_until(deadline) => Err(AuthError::TimedOut),
        }
    }

    fn finish(&self, attempt: u64, outcome: &Result<VerifiedIdentity, AuthError>) {
        self.challenges.clear(attempt);
        if !self.release(attempt) {
            debug!(attempt, "Superseded attempt finished");
            return;
        }

        let terminal = match outcome {
            Ok(identity) => {
                info!(address = %identity.address, "Authentication verified");
                AuthPhase::Verified {
                    address: identity.address.to_string(),
                }
            }
            Err(AuthError::TimedOut) => {
                warn!("Authentication timed out");
                AuthPhase::TimedOut
            }
            Err(AuthError::Cancelled) => {
                info!("Authentication cancelled");
                AuthPhase::Cancelled
            }
            Err(e) => {
                if e.is_rejection() {
                    warn!(error = %e, error_code = e.error_code(), "Authentication rejected");
                } else {
                    error!(error = %e, error_code = e.error_code(), "Authentication failed");
                }
                AuthPhase::Rejected {
                    reason: e.to_string(),
                }
            }
        };
        self.set_phase(terminal);
        self.set_phase(AuthPhase::Idle);
    }

    fn set_phase(&self, phase: AuthPhase) {
        // No transition subscribers is fine.
        let _ = self.transitions.send(phase.clone());
        self.phase.send_replace(phase);
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveAttempt>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Release the active slot if `attempt` holds it.
    fn release(&self, attempt: u64) -> bool {
        let mut active = self.lock_active();
        if matches!(&*active, Some(a) if a.id == attempt) {
            *active = None;
            true
        } else {
            false
        }
    }

    fn publish(&self, attempt: u64, phase: AuthPhase) {
        if matches!(&*self.lock_active(), Some(a) if a.id == attempt) {
            self.set_phase(phase);
        }
    }
}

/// Tears the attempt down if its future is dropped before completion.
struct AttemptGuard<'a> {
    authenticator: &'a ChallengeAuthenticator,
    attempt: u64,
    listener: Option<RunningListener>,
}

struct RunningListener {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl AttemptGuard<'_> {
    async fn close_listener(&mut self, grace: Duration) {
        let Some(RunningListener { shutdown, mut task }) = self.listener.take() else {
            return;
        };
        shutdown.cancel();
        if tokio::time::timeout(grace, &mut task).await.is_err() {
            warn!("Callback listener did not drain in time, aborting");
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.shutdown.cancel();
            listener.task.abort();
        }
        let auth = self.authenticator;
        auth.challenges.clear(self.attempt);
        if auth.release(self.attempt) {
            auth.set_phase(AuthPhase::Cancelled);
            auth.set_phase(AuthPhase::Idle);
        }
    }
}

async fn bind_loopback(range: &RangeInclusive<u16>) -> Result<TcpListener, AuthError> {
    for port in range.clone() {
        match TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => debug!(port, error = %e, "Callback port unavailable"),
        }
    }
    Err(AuthError::PortRangeExhausted {
        start: *range.start(),
        end: *range.end(),
    })
}

fn spawn_listener(listener: TcpListener, state: CallbackState) -> RunningListener {
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, callback_router(state))
            .with_graceful_shutdown(signal.cancelled_owned())
            .await
        {
            warn!(error = %e, "Callback listener stopped with error");
        }
    });
    RunningListener { shutdown, task }
}
