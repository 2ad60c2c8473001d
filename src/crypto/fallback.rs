// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Legacy unauthenticated payload format.
//!
//! Some older uploads are plain AES-256-CBC streams: the first 16 bytes are
//! the IV, the remainder is PKCS#7-padded ciphertext, and the key is the
//! SHA-256 digest of the key material string as delivered by the backend.
//! There is no tag, so this format is only ever tried after the primary
//! format has rejected the input as structurally foreign.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::token::IV_LEN;
use super::{DecoderStrategy, KeyMaterial, TokenError};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

fn derive_key(key: &KeyMaterial) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(Sha256::digest(key.encoded().as_bytes()).into())
}

/// Encrypt `plaintext` in the legacy layout.
pub fn encrypt_legacy(
    plaintext: &[u8],
    key: &KeyMaterial,
    iv: [u8; IV_LEN],
) -> Result<Vec<u8>, TokenError> {
    let derived = derive_key(key);
    let ciphertext = Aes256CbcEnc::new_from_slices(&derived[..], &iv)
        .map_err(|e| TokenError::EncryptionFailed(e.to_string()))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Strategy for the legacy IV-prefixed format.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyCbcFormat;

impl DecoderStrategy for LegacyCbcFormat {
    fn name(&self) -> &'static str {
        "legacy-cbc"
    }

    fn decode(&self, input: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, TokenError> {
        if input.len() < IV_LEN * 2 {
            return Err(TokenError::MalformedToken(format!(
                "legacy payload is {} bytes, minimum is {}",
                input.len(),
                IV_LEN * 2
            )));
        }
        let (iv, ciphertext) = input.split_at(IV_LEN);
        if ciphertext.len() % IV_LEN != 0 {
            return Err(TokenError::DecryptionFailed(
                "legacy ciphertext is not block aligned".to_string(),
            ));
        }

        let derived = derive_key(key);
        Aes256CbcDec::new_from_slices(&derived[..], iv)
            .map_err(|e| TokenError::DecryptionFailed(e.to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| TokenError::DecryptionFailed("invalid padding".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> KeyMaterial {
        KeyMaterial::from_bytes(&[0x11; 32]).unwrap()
    }

    #[test]
    fn legacy_round_trip() {
        let key = key();
        let payload = encrypt_legacy(b"legacy csv,data", &key, [2u8; IV_LEN]).unwrap();
        assert_eq!(&payload[..IV_LEN], &[2u8; IV_LEN]);
        assert_eq!(LegacyCbcFormat.decode(&payload, &key).unwrap(), b"legacy csv,data");
    }

    #[test]
    fn key_is_derived_from_encoded_form() {
        let key = key();
        let expected: [u8; 32] = Sha256::digest(key.encoded().as_bytes()).into();
        assert_eq!(*derive_key(&key), expected);
    }

    #[test]
    fn too_short_is_malformed() {
        let err = LegacyCbcFormat.decode(&[0u8; 20], &key()).unwrap_err();
        assert!(matches!(err, TokenError::MalformedToken(_)));
    }

    #[test]
    fn misaligned_is_decryption_failure() {
        let err = LegacyCbcFormat.decode(&[0u8; 40], &key()).unwrap_err();
        assert!(matches!(err, TokenError::DecryptionFailed(_)));
    }
}
