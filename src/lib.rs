// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Memvault - Volatile Unlock Cache
//!
//! Decrypted, access-controlled payloads live only in process memory for a
//! bounded time and are exposed through a read-only virtual filesystem.
//! Access is gated on proving wallet ownership through a local signing
//! flow.
//!
//! ## Modules
//!
//! - `auth` - Wallet challenge authentication and sessions
//! - `backend` - Access backend client (key material, ciphertext)
//! - `crypto` - Token decoding with legacy fallback
//! - `storage` - Expiring in-memory secret store and sweeper
//! - `unlock` - Unlock orchestration
//! - `vfs` - Read-only virtual filesystem over the store

pub mod auth;
pub mod backend;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod state;
pub mod storage;
pub mod unlock;
pub mod vfs;
