// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
///
/// Rejections (nonce, expiry, signature) are the security boundary and are
/// always propagated as-is. Listener failures are transport errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Callback nonce differs from the outstanding challenge
    #[error("nonce does not match the outstanding challenge")]
    NonceMismatch,
    /// No challenge is outstanding (never issued, superseded, or consumed)
    #[error("no sign-in challenge is outstanding")]
    NoActiveChallenge,
    /// Challenge lifetime has passed
    #[error("sign-in challenge has expired")]
    ChallengeExpired,
    /// Signature recovered to a different address
    #[error("signature was produced by {recovered}, not {claimed}")]
    SignatureMismatch { claimed: String, recovered: String },
    /// Signature bytes could not be decoded or recovered
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    /// Claimed address is not a valid account address
    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),
    /// No valid callback before the challenge timer fired
    #[error("timed out waiting for wallet signature")]
    TimedOut,
    /// Caller cancelled
    #[error("authentication was cancelled")]
    Cancelled,
    /// A newer `authenticate` call replaced this one
    #[error("authentication was superseded by a newer request")]
    Superseded,
    /// Every port in the callback range is taken
    #[error("no free callback port in {start}..={end}")]
    PortRangeExhausted { start: u16, end: u16 },
    /// Listener or channel failure
    #[error("callback listener failed: {0}")]
    Listener(String),
    /// System RNG failure
    #[error("secure randomness unavailable")]
    Randomness,
}

#[derive(Serialize)]
struct AuthErrorBody {
    success: bool,
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::NonceMismatch => "nonce_mismatch",
            AuthError::NoActiveChallenge => "no_active_challenge",
            AuthError::ChallengeExpired => "challenge_expired",
            AuthError::SignatureMismatch { .. } => "signature_mismatch",
            AuthError::MalformedSignature(_) => "malformed_signature",
            AuthError::InvalidAddress(_) => "invalid_address",
            AuthError::TimedOut => "timed_out",
            AuthError::Cancelled => "cancelled",
            AuthError::Superseded => "superseded",
            AuthError::PortRangeExhausted { .. } => "port_range_exhausted",
            AuthError::Listener(_) => "listener_error",
            AuthError::Randomness => "randomness_unavailable",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MalformedSignature(_) | AuthError::InvalidAddress(_) => {
                StatusCode::BAD_REQUEST
            }
            AuthError::NonceMismatch | AuthError::SignatureMismatch { .. } => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::NoActiveChallenge
            | AuthError::ChallengeExpired
            | AuthError::TimedOut
            | AuthError::Cancelled
            | AuthError::Superseded => StatusCode::GONE,
            AuthError::PortRangeExhausted { .. }
            | AuthError::Listener(_)
            | AuthError::Randomness => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this is a verification rejection rather than an abort or
    /// transport failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::NonceMismatch
                | AuthError::NoActiveChallenge
                | AuthError::ChallengeExpired
                | AuthError::SignatureMismatch { .. }
                | AuthError::MalformedSignature(_)
                | AuthError::InvalidAddress(_)
        )
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            success: false,
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn nonce_mismatch_returns_401_with_body() {
        let response = AuthError::NonceMismatch.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error_code"], "nonce_mismatch");
    }

    #[tokio::test]
    async fn expired_challenge_returns_410() {
        let response = AuthError::ChallengeExpired.into_response();
        assert_eq!(response.status(), StatusCode::GONE);
    }

    #[test]
    fn rejections_are_classified() {
        assert!(AuthError::NonceMismatch.is_rejection());
        assert!(AuthError::ChallengeExpired.is_rejection());
        assert!(!AuthError::TimedOut.is_rejection());
        assert!(!AuthError::PortRangeExhausted { start: 1, end: 2 }.is_rejection());
    }
}
