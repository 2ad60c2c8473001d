// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ordered decoder strategies.
//!
//! The first strategy is authoritative for error reporting: later
//! strategies run after any primary failure, and if every strategy fails
//! the first strategy's error is returned. A tampered primary token that no
//! other format accepts therefore still reports `AuthenticationFailed`.

use tracing::debug;

use super::fallback::LegacyCbcFormat;
use super::token::FernetFormat;
use super::{KeyMaterial, TokenError};

/// A single payload format.
pub trait DecoderStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Recover plaintext from `input`.
    fn decode(&self, input: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, TokenError>;
}

/// Decrypts downloaded payloads with the primary format first.
pub struct TokenCodec {
    strategies: Vec<Box<dyn DecoderStrategy>>,
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new(vec![Box::new(FernetFormat), Box::new(LegacyCbcFormat)])
    }
}

impl TokenCodec {
    /// Build a codec from strategies in priority order.
    pub fn new(strategies: Vec<Box<dyn DecoderStrategy>>) -> Self {
        Self { strategies }
    }

    /// Codec that only accepts the primary token format.
    pub fn strict() -> Self {
        Self::new(vec![Box::new(FernetFormat)])
    }

    /// Decode with key material still in its base64url transport form.
    ///
    /// The key is validated before the payload is touched.
    pub fn decode_with_encoded_key(&self, input: &[u8], key: &str) -> Result<Vec<u8>, TokenError> {
        let key = KeyMaterial::from_base64url(key)?;
        self.decode(input, &key)
    }

    pub fn decode(&self, input: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, TokenError> {
        let mut strategies = self.strategies.iter();
        let Some(primary) = strategies.next() else {
            return Err(TokenError::MalformedToken("no decoder configured".to_string()));
        };

        let primary_err = match primary.decode(input, key) {
            Ok(plaintext) => return Ok(plaintext),
            Err(e) => e,
        };

        debug!(strategy = primary.name(), error = %primary_err, "Primary format rejected payload");

        for strategy in strategies {
            match strategy.decode(input, key) {
                Ok(plaintext) => {
                    debug!(
                        strategy = strategy.name(),
                        primary = primary.name(),
                        "Payload decoded with secondary format"
                    );
                    return Ok(plaintext);
                }
                Err(e) => {
                    debug!(
                        strategy = strategy.name(),
                        error = %e,
                        "Secondary format rejected payload"
                    );
                }
            }
        }

        Err(primary_err)
    }
}
