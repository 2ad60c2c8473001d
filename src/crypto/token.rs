// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Primary authenticated-encryption token format.
//!
//! ## Layout
//!
//! ```text
//! +---------+-----------+--------+----------------+---------+
//! | version | timestamp |   IV   |   ciphertext   |   tag   |
//! |  1 byte |  8 bytes  | 16 B   |  n * 16 bytes  | 32 B    |
//! +---------+-----------+--------+----------------+---------+
//! ```
//!
//! - `timestamp` is big-endian seconds since the Unix epoch
//! - `ciphertext` is AES-128-CBC with PKCS#7 padding under the second half
//!   of the key material
//! - `tag` is HMAC-SHA256 over every preceding byte under the first half
//!
//! The tag is always verified, in constant time, before any decryption.
//! Tokens are usually shipped base64url-encoded; [`FernetFormat`] accepts
//! both the raw and the wrapped form.

use aes::Aes128;
use base64ct::{Base64Url, Encoding};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{decode_base64url, DecoderStrategy, KeyMaterial, TokenError};

type HmacSha256 = Hmac<Sha256>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// The only supported format version.
pub const TOKEN_VERSION: u8 = 0x80;

const VERSION_LEN: usize = 1;
const TIMESTAMP_LEN: usize = 8;
/// AES block / IV length.
pub const IV_LEN: usize = 16;
/// HMAC-SHA256 tag length.
pub const TAG_LEN: usize = 32;
const HEADER_LEN: usize = VERSION_LEN + TIMESTAMP_LEN + IV_LEN;

/// Smallest structurally valid token (empty ciphertext).
pub const MIN_TOKEN_LEN: usize = HEADER_LEN + TAG_LEN;

/// A structurally validated view over raw token bytes.
#[derive(Debug, Clone, Copy)]
pub struct Token<'a> {
    raw: &'a [u8],
}

impl<'a> Token<'a> {
    /// Validate length and version. No cryptography happens here.
    pub fn parse(raw: &'a [u8]) -> Result<Self, TokenError> {
        if raw.len() < MIN_TOKEN_LEN {
            return Err(TokenError::MalformedToken(format!(
                "token is {} bytes, minimum is {MIN_TOKEN_LEN}",
                raw.len()
            )));
        }
        if raw[0] != TOKEN_VERSION {
            return Err(TokenError::MalformedToken(format!(
                "unsupported version byte 0x{:02x}",
                raw[0]
            )));
        }
        Ok(Self { raw })
    }

    pub fn version(&self) -> u8 {
        self.raw[0]
    }

    /// Seconds since the Unix epoch at which the token was produced.
    pub fn timestamp(&self) -> u64 {
        let mut buf = [0u8; TIMESTAMP_LEN];
        buf.copy_from_slice(&self.raw[VERSION_LEN..VERSION_LEN + TIMESTAMP_LEN]);
        u64::from_be_bytes(buf)
    }

    /// Timestamp as a UTC datetime, if representable.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.timestamp())
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    pub fn iv(&self) -> &'a [u8] {
        &self.raw[VERSION_LEN + TIMESTAMP_LEN..HEADER_LEN]
    }

    pub fn ciphertext(&self) -> &'a [u8] {
        &self.raw[HEADER_LEN..self.raw.len() - TAG_LEN]
    }

    pub fn tag(&self) -> &'a [u8] {
        &self.raw[self.raw.len() - TAG_LEN..]
    }

    /// Every byte covered by the tag.
    fn signed_portion(&self) -> &'a [u8] {
        &self.raw[..self.raw.len() - TAG_LEN]
    }

    /// Recompute the tag and compare it in constant time.
    pub fn verify(&self, key: &KeyMaterial) -> Result<(), TokenError> {
        let mut mac = HmacSha256::new_from_slice(key.signing_key())
            .map_err(|_| TokenError::KeyLengthInvalid { actual: key.signing_key().len() })?;
        mac.update(self.signed_portion());
        // verify_slice compares through `subtle`, never a short-circuiting loop.
        mac.verify_slice(self.tag())
            .map_err(|_| TokenError::AuthenticationFailed)
    }

    /// Verify the tag, then decrypt.
    pub fn open(&self, key: &KeyMaterial) -> Result<Vec<u8>, TokenError> {
        self.verify(key)?;

        let ciphertext = self.ciphertext();
        if ciphertext.is_empty() || ciphertext.len() % IV_LEN != 0 {
            return Err(TokenError::DecryptionFailed(format!(
                "ciphertext length {} is not a positive multiple of the block size",
                ciphertext.len()
            )));
        }

        Aes128CbcDec::new_from_slices(key.encryption_key(), self.iv())
            .map_err(|e| TokenError::DecryptionFailed(e.to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| TokenError::DecryptionFailed("invalid padding".to_string()))
    }
}

/// Produce a raw token for `plaintext`.
pub fn encode(
    plaintext: &[u8],
    key: &KeyMaterial,
    iv: [u8; IV_LEN],
    timestamp: u64,
) -> Result<Vec<u8>, TokenError> {
    let ciphertext = Aes128CbcEnc::new_from_slices(key.encryption_key(), &iv)
        .map_err(|e| TokenError::EncryptionFailed(e.to_string()))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut token = Vec::with_capacity(MIN_TOKEN_LEN + ciphertext.len());
    token.push(TOKEN_VERSION);
    token.extend_from_slice(&timestamp.to_be_bytes());
    token.extend_from_slice(&iv);
    token.extend_from_slice(&ciphertext);

    let mut mac = HmacSha256::new_from_slice(key.signing_key())
        .map_err(|e| TokenError::EncryptionFailed(e.to_string()))?;
    mac.update(&token);
    token.extend_from_slice(&mac.finalize().into_bytes());
    Ok(token)
}

/// Produce the base64url transport form of a token.
pub fn encode_base64url(
    plaintext: &[u8],
    key: &KeyMaterial,
    iv: [u8; IV_LEN],
    timestamp: u64,
) -> Result<String, TokenError> {
    encode(plaintext, key, iv, timestamp).map(|raw| Base64Url::encode_string(&raw))
}

/// Strategy for the primary token format, raw or base64url-wrapped.
#[derive(Debug, Default, Clone, Copy)]
pub struct FernetFormat;

impl FernetFormat {
    fn unwrap_base64(input: &[u8]) -> Option<Vec<u8>> {
        let text = std::str::from_utf8(input).ok()?;
        decode_base64url(text.trim()).ok()
    }
}

impl DecoderStrategy for FernetFormat {
    fn name(&self) -> &'static str {
        "fernet"
    }

    fn decode(&self, input: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, TokenError> {
        let raw_err = match Token::parse(input) {
            Ok(token) => return token.open(key),
            Err(e) => e,
        };

        // A leading version byte means the raw form was the token; no retry.
        if input.first() == Some(&TOKEN_VERSION) {
            return Err(raw_err);
        }

        let Some(decoded) = Self::unwrap_base64(input) else {
            return Err(raw_err);
        };
        // Once the decoded bytes parse as a token, its tag or padding failure
        // is the real outcome and is reported instead of the raw-form error,
        // so an authentication failure is never masked as malformed input.
        match Token::parse(&decoded) {
            Ok(token) => token.open(key),
            Err(_) => Err(raw_err),
        }
    }
}
