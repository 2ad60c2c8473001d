// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token codec errors.

/// Failure decoding or encoding an encrypted payload.
///
/// Format failures (`MalformedToken`, `KeyLengthInvalid`, `KeyEncodingInvalid`)
/// are raised before any cryptographic work. `AuthenticationFailed` is raised
/// before any decryption is attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("key material must decode to 32 bytes, got {actual}")]
    KeyLengthInvalid { actual: usize },

    #[error("key material is not valid base64url: {0}")]
    KeyEncodingInvalid(String),

    #[error("token authentication tag does not match")]
    AuthenticationFailed,

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}

impl TokenError {
    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            TokenError::MalformedToken(_) => "malformed_token",
            TokenError::KeyLengthInvalid { .. } => "key_length_invalid",
            TokenError::KeyEncodingInvalid(_) => "key_encoding_invalid",
            TokenError::AuthenticationFailed => "authentication_failed",
            TokenError::DecryptionFailed(_) => "decryption_failed",
            TokenError::EncryptionFailed(_) => "encryption_failed",
        }
    }
}
