// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Volatile Secret Storage
//!
//! Decrypted payloads are held in process memory only. Nothing in this
//! module touches the filesystem.
//!
//! ## Lifecycle
//!
//! - Created by a successful decode, stored with an absolute expiry
//! - Destroyed by explicit removal, a read after expiry, the periodic
//!   sweep, capacity eviction, or a full clear
//! - Buffers are zeroed when the last snapshot is dropped

pub mod error;
pub mod events;
pub mod secret;
pub mod secret_store;
pub mod sweeper;

pub use error::StoreError;
pub use events::{RemovalReason, StoreEvent};
pub use secret::{SecretBytes, StoredSecret};
pub use secret_store::{EntryStats, ExpiringSecretStore, StoreStats, DEFAULT_MAX_ENTRIES};
pub use sweeper::{SecretSweeper, DEFAULT_SWEEP_INTERVAL};
