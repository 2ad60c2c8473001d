// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Symmetric key material handed out by the access backend.
//!
//! The backend returns a URL-safe base64 string that decodes to exactly
//! 32 bytes: a 16-byte HMAC signing key followed by a 16-byte AES key.

use base64ct::{Base64Url, Encoding};
use zeroize::Zeroizing;

use super::{decode_base64url, TokenError};

/// Decoded key length in bytes.
pub const KEY_MATERIAL_LEN: usize = 32;

const SIGNING_KEY_LEN: usize = 16;

/// Validated 32-byte key material. Zeroed on drop.
pub struct KeyMaterial {
    bytes: Zeroizing<[u8; KEY_MATERIAL_LEN]>,
    encoded: Zeroizing<String>,
}

impl KeyMaterial {
    /// Decode key material from its base64url transport form.
    ///
    /// Fails with `KeyLengthInvalid` unless the decoded form is exactly
    /// 32 bytes.
    pub fn from_base64url(encoded: &str) -> Result<Self, TokenError> {
        let trimmed = encoded.trim();
        let decoded = Zeroizing::new(
            decode_base64url(trimmed)
                .map_err(|e| TokenError::KeyEncodingInvalid(e.to_string()))?,
        );

        let bytes = to_array(&decoded)?;
        Ok(Self {
            bytes,
            encoded: Zeroizing::new(trimmed.to_string()),
        })
    }

    /// Wrap raw key bytes.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, TokenError> {
        let bytes = to_array(raw)?;
        Ok(Self {
            encoded: Zeroizing::new(Base64Url::encode_string(&bytes[..])),
            bytes,
        })
    }

    /// HMAC-SHA256 key (first half).
    pub fn signing_key(&self) -> &[u8] {
        &self.bytes[..SIGNING_KEY_LEN]
    }

    /// AES-128 key (second half).
    pub fn encryption_key(&self) -> &[u8] {
        &self.bytes[SIGNING_KEY_LEN..]
    }

    /// The key material exactly as it was supplied.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }
}

fn to_array(raw: &[u8]) -> Result<Zeroizing<[u8; KEY_MATERIAL_LEN]>, TokenError> {
    if raw.len() != KEY_MATERIAL_LEN {
        return Err(TokenError::KeyLengthInvalid { actual: raw.len() });
    }
    let mut bytes = Zeroizing::new([0u8; KEY_MATERIAL_LEN]);
    bytes.copy_from_slice(raw);
    Ok(bytes)
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyMaterial(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64ct::Base64UrlUnpadded;

    #[test]
    fn splits_signing_and_encryption_halves() {
        let raw: Vec<u8> = (0u8..32).collect();
        let key = KeyMaterial::from_bytes(&raw).unwrap();
        assert_eq!(key.signing_key(), &raw[..16]);
        assert_eq!(key.encryption_key(), &raw[16..]);
    }

    #[test]
    fn accepts_padded_and_unpadded_forms() {
        let raw = [7u8; 32];
        let padded = Base64Url::encode_string(&raw);
        let unpadded = Base64UrlUnpadded::encode_string(&raw);
        assert!(padded.ends_with('='));

        let a = KeyMaterial::from_base64url(&padded).unwrap();
        let b = KeyMaterial::from_base64url(&unpadded).unwrap();
        assert_eq!(a.signing_key(), b.signing_key());
        assert_eq!(a.encoded(), padded);
    }

    #[test]
    fn rejects_wrong_lengths() {
        for len in [0usize, 16, 31, 33, 64] {
            let encoded = Base64Url::encode_string(&vec![1u8; len]);
            let err = KeyMaterial::from_base64url(&encoded).unwrap_err();
            assert_eq!(err, TokenError::KeyLengthInvalid { actual: len });
        }
    }

    #[test]
    fn rejects_invalid_encoding() {
        let err = KeyMaterial::from_base64url("not base64 at all!").unwrap_err();
        assert!(matches!(err, TokenError::KeyEncodingInvalid(_)));
    }

    #[test]
    fn debug_hides_key() {
        let key = KeyMaterial::from_bytes(&[0xAB; 32]).unwrap();
        let debug = format!("{key:?}");
        assert!(debug.contains("***"));
        assert!(!debug.to_lowercase().contains("ab"));
    }
}
