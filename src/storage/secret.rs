// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decrypted payloads held by the secret store.
//!
//! Plaintext lives in a [`SecretBytes`] buffer that is zeroed when the last
//! holder drops it. The store owns the canonical handle; readers receive a
//! snapshot sharing the same buffer, so eviction never leaves an un-zeroed
//! copy behind once the read completes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

/// Plaintext buffer, zeroed on drop.
pub struct SecretBytes(Zeroizing<Vec<u8>>);

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes({} bytes)", self.0.len())
    }
}

/// A decrypted payload plus its expiry metadata.
///
/// Never serialized.
#[derive(Debug, Clone)]
pub struct StoredSecret {
    /// Opaque record identifier.
    pub identifier: String,
    /// File name presented through the virtual filesystem.
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    bytes: Arc<SecretBytes>,
}

impl StoredSecret {
    pub(crate) fn new(
        identifier: String,
        display_name: String,
        plaintext: Vec<u8>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier,
            display_name,
            created_at,
            expires_at,
            bytes: Arc::new(SecretBytes::new(plaintext)),
        }
    }

    /// The plaintext. Borrow it for the duration of a read only.
    pub fn plaintext(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Expired once `now` reaches `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Milliseconds left before expiry, floored at zero.
    pub fn remaining_millis_at(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_milliseconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn secret(now: DateTime<Utc>) -> StoredSecret {
        StoredSecret::new(
            "7".to_string(),
            "data.csv".to_string(),
            b"a,b\n1,2\n".to_vec(),
            now,
            now + Duration::milliseconds(1000),
        )
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let s = secret(now);
        assert!(!s.is_expired_at(now + Duration::milliseconds(999)));
        assert!(s.is_expired_at(now + Duration::milliseconds(1000)));
        assert!(s.is_expired_at(now + Duration::milliseconds(1001)));
    }

    #[test]
    fn remaining_millis_floors_at_zero() {
        let now = Utc::now();
        let s = secret(now);
        assert_eq!(s.remaining_millis_at(now), 1000);
        assert_eq!(s.remaining_millis_at(now + Duration::seconds(5)), 0);
    }

    #[test]
    fn snapshots_share_the_buffer() {
        let s = secret(Utc::now());
        let snapshot = s.clone();
        assert_eq!(snapshot.plaintext(), s.plaintext());
        assert_eq!(Arc::strong_count(&s.bytes), 2);
    }

    #[test]
    fn debug_never_prints_plaintext() {
        let s = secret(Utc::now());
        let debug = format!("{s:?}");
        assert!(debug.contains("8 bytes"));
        assert!(!debug.contains("a,b"));
    }
}
