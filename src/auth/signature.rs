// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Personal-message signature recovery.

use std::str::FromStr;

use alloy::primitives::{Address, Signature};

use super::AuthError;

/// Parse a claimed `0x`-prefixed account address. Case is not significant.
pub fn parse_address(address: &str) -> Result<Address, AuthError> {
    Address::from_str(address.trim()).map_err(|e| AuthError::InvalidAddress(e.to_string()))
}

/// Recover the address that produced `signature` over `message`.
///
/// `signature` is the 65-byte `r || s || v` form, hex encoded, as returned
/// by `personal_sign`.
pub fn recover_signer(message: &str, signature: &str) -> Result<Address, AuthError> {
    let raw = alloy::hex::decode(signature.trim())
        .map_err(|e| AuthError::MalformedSignature(e.to_string()))?;
    let signature =
        Signature::from_raw(&raw).map_err(|e| AuthError::MalformedSignature(e.to_string()))?;
    signature
        .recover_address_from_msg(message.as_bytes())
        .map_err(|e| AuthError::MalformedSignature(e.to_string()))
}

/// Verify that `claimed` signed `message`. Returns the recovered address.
pub fn verify_signature(
    message: &str,
    claimed: &str,
    signature: &str,
) -> Result<Address, AuthError> {
    let claimed = parse_address(claimed)?;
    let recovered = recover_signer(message, signature)?;
    if recovered != claimed {
        return Err(AuthError::SignatureMismatch {
            claimed: claimed.to_string(),
            recovered: recovered.to_string(),
        });
    }
    Ok(recovered)
}
