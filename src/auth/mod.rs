// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Proves control of a wallet before any record is unlocked.
//!
//! ## Auth Flow
//!
//! 1. A fresh 32-byte nonce is issued and embedded in a fixed sign-in message
//! 2. A listener is bound on 127.0.0.1 (first free port in the range)
//! 3. The user opens the callback URL; the page asks the wallet extension to
//!    `personal_sign` the message and posts `{address, signature, nonce}` to
//!    `/callback`
//! 4. The callback is checked in order:
//!    - nonce matches the outstanding challenge
//!    - challenge has not expired
//!    - signature recovers to the claimed address
//! 5. The listener is shut down and a proven [`WalletSession`] can be
//!    established from the [`VerifiedIdentity`]
//!
//! ## Security
//!
//! - Only the most recent nonce is accepted; any callback consumes it
//! - The listener never binds outside loopback
//! - Signatures and nonces are not logged

pub mod authenticator;
pub mod challenge;
pub mod error;
pub mod page;
pub mod server;
pub mod session;
pub mod signature;

pub use authenticator::{
    AuthPhase, AuthenticatorConfig, ChallengeAuthenticator, DEFAULT_CALLBACK_PORTS,
};
pub use challenge::{signing_message, AuthChallenge, ChallengeSlot};
pub use error::AuthError;
pub use page::render_signer_page;
pub use server::{callback_router, CallbackRequest, CallbackState};
pub use session::{PersistedSession, SessionManager, VerifiedIdentity, WalletSession};
pub use signature::{parse_address, recover_signer, verify_signature};
