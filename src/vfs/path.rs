// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Virtual filesystem addresses.
//!
//! ```text
//! memvault:/                         root, one directory per identifier
//! memvault:/{identifier}             record directory
//! memvault:/{identifier}/{name}      the unlocked file
//! ```
//!
//! The scheme prefix is optional when parsing; bare paths with or without a
//! leading slash are accepted.

use super::VfsError;

/// URI scheme the host registers the filesystem under.
pub const SCHEME: &str = "memvault";

/// A parsed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualPath {
    Root,
    Record {
        identifier: String,
    },
    File {
        identifier: String,
        display_name: String,
    },
}

impl VirtualPath {
    pub fn file(identifier: impl Into<String>, display_name: impl Into<String>) -> Self {
        VirtualPath::File {
            identifier: identifier.into(),
            display_name: display_name.into(),
        }
    }

    pub fn parse(address: &str) -> Result<Self, VfsError> {
        let path = address
            .strip_prefix(SCHEME)
            .and_then(|rest| rest.strip_prefix(':'))
            .unwrap_or(address);
        let trimmed = path.trim_matches('/');

        if trimmed.is_empty() {
            return Ok(VirtualPath::Root);
        }

        let mut segments = trimmed.split('/');
        let identifier = segments.next().unwrap_or_default();
        let display_name = segments.next();

        if segments.next().is_some() {
            return Err(VfsError::InvalidAddress(address.to_string()));
        }
        validate_segment(identifier, address)?;

        match display_name {
            None => Ok(VirtualPath::Record {
                identifier: identifier.to_string(),
            }),
            Some(name) => {
                validate_segment(name, address)?;
                Ok(VirtualPath::file(identifier, name))
            }
        }
    }

    /// Path form without scheme, always starting with `/`.
    pub fn to_path_string(&self) -> String {
        match self {
            VirtualPath::Root => "/".to_string(),
            VirtualPath::Record { identifier } => format!("/{identifier}"),
            VirtualPath::File {
                identifier,
                display_name,
            } => format!("/{identifier}/{display_name}"),
        }
    }

    /// Full URI form, e.g. `memvault:/7/data.csv`.
    pub fn to_uri(&self) -> String {
        format!("{SCHEME}:{}", self.to_path_string())
    }
}

impl std::fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_path_string())
    }
}

fn validate_segment(segment: &str, address: &str) -> Result<(), VfsError> {
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(VfsError::InvalidAddress(address.to_string()));
    }
    Ok(())
}
