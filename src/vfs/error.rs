// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Virtual filesystem errors.

/// Failure of a virtual filesystem call.
///
/// `NotFound` is an ordinary outcome (never unlocked, or expired).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VfsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("{operation} is not permitted: {address} is read-only")]
    PermissionDenied {
        operation: &'static str,
        address: String,
    },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("{0} is a directory")]
    IsADirectory(String),

    #[error("{0} is not a directory")]
    NotADirectory(String),
}

impl VfsError {
    pub fn error_code(&self) -> &'static str {
        match self {
            VfsError::NotFound(_) => "file_not_found",
            VfsError::PermissionDenied { .. } => "no_permissions",
            VfsError::InvalidAddress(_) => "invalid_address",
            VfsError::IsADirectory(_) => "file_is_a_directory",
            VfsError::NotADirectory(_) => "file_not_a_directory",
        }
    }
}
