// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

/// Secret store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("identifier is not a single path segment: {0:?}")]
    InvalidIdentifier(String),

    #[error("display name is not a single path segment: {0:?}")]
    InvalidDisplayName(String),
}

impl StoreError {
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::InvalidIdentifier(_) => "invalid_identifier",
            StoreError::InvalidDisplayName(_) => "invalid_display_name",
        }
    }
}
