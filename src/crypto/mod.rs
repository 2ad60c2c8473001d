// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Payload Cryptography
//!
//! Decrypts payloads downloaded from content-addressed storage using key
//! material issued by the access backend.
//!
//! - `key` - 32-byte key material (signing half + encryption half)
//! - `token` - primary HMAC-SHA256 / AES-128-CBC token format
//! - `fallback` - legacy IV-prefixed AES-256-CBC format
//! - `codec` - ordered strategies with primary-error authority
//!
//! Decoding is CPU-bound and synchronous. Async callers should run it on a
//! blocking worker.

pub mod codec;
pub mod error;
pub mod fallback;
pub mod key;
pub mod token;

pub use codec::{DecoderStrategy, TokenCodec};
pub use error::TokenError;
pub use key::{KeyMaterial, KEY_MATERIAL_LEN};
pub use token::{Token, MIN_TOKEN_LEN, TOKEN_VERSION};

use base64ct::{Base64Url, Base64UrlUnpadded, Encoding};

/// Decode URL-safe base64, padded or not.
pub(crate) fn decode_base64url(input: &str) -> Result<Vec<u8>, base64ct::Error> {
    if input.ends_with('=') {
        Base64Url::decode_vec(input)
    } else {
        Base64UrlUnpadded::decode_vec(input)
    }
}
