// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Read-Only Virtual Filesystem
//!
//! Exposes unlocked payloads to a host file-access layer as
//! `memvault:/{identifier}/{displayName}`. Reads are served from the secret
//! store only; all mutating calls are refused.

pub mod error;
pub mod path;
pub mod provider;

pub use error::VfsError;
pub use path::{VirtualPath, SCHEME};
pub use provider::{
    DirEntry, FileChange, FileChangeKind, FileStat, FileType, FileWatcher, ReadOnlyVirtualFs,
};
