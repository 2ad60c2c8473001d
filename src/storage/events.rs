// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Change notifications emitted by the secret store.

use serde::Serialize;

/// Why an entry left the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// Explicit `remove`.
    Removed,
    /// Expiry passed (read-time check or sweep).
    Expired,
    /// Displaced by the capacity bound.
    Evicted,
    /// Full-store `clear`.
    Cleared,
    /// Overwritten under a different display name.
    Replaced,
}

/// A single store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Inserted {
        identifier: String,
        display_name: String,
    },
    Removed {
        identifier: String,
        display_name: String,
        reason: RemovalReason,
    },
}
