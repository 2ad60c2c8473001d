// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Loopback callback listener.
//!
//! Serves the signer page on `GET /` and accepts the signed challenge on
//! `POST /callback`. The first callback resolves the attempt; the response
//! body reports the outcome back to the browser.

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::{render_signer_page, verify_signature, AuthError, ChallengeSlot, VerifiedIdentity};
use crate::clock::Clock;
use crate::error::ApiError;

pub type CallbackOutcome = Result<VerifiedIdentity, AuthError>;

/// Body posted by the signer page.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackRequest {
    pub address: String,
    pub signature: String,
    pub nonce: String,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub success: bool,
    pub address: String,
}

/// Shared state for one authentication attempt's listener.
#[derive(Clone)]
pub struct CallbackState {
    attempt: u64,
    challenges: Arc<ChallengeSlot>,
    clock: Arc<dyn Clock>,
    outcome: Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>,
}

impl CallbackState {
    pub fn new(
        attempt: u64,
        challenges: Arc<ChallengeSlot>,
        clock: Arc<dyn Clock>,
    ) -> (Self, oneshot::Receiver<CallbackOutcome>) {
        let (tx, rx) = oneshot::channel();
        let state = Self {
            attempt,
            challenges,
            clock,
            outcome: Arc::new(Mutex::new(Some(tx))),
        };
        (state, rx)
    }

    /// Nonce first, then expiry, then signature.
    fn verify(&self, request: &CallbackRequest) -> CallbackOutcome {
        let now = self.clock.now();
        let challenge = self.challenges.consume(self.attempt, &request.nonce, now)?;
        let address = verify_signature(&challenge.message(), &request.address, &request.signature)?;
        Ok(VerifiedIdentity {
            address,
            signature: request.signature.clone(),
            verified_at: now,
        })
    }

    /// Hand the outcome to the waiting authenticator. Only the first call
    /// has any effect.
    fn resolve(&self, outcome: CallbackOutcome) {
        let sender = self
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(outcome);
        }
    }
}

/// Build the callback router.
pub fn callback_router(state: CallbackState) -> Router {
    Router::new()
        .route("/", get(signer_page))
        .route("/callback", post(receive_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn signer_page(State(state): State<CallbackState>) -> Result<Html<String>, ApiError> {
    state
        .challenges
        .current(state.attempt)
        .map(|challenge| Html(render_signer_page(&challenge)))
        .ok_or_else(|| ApiError::gone("No sign-in request is pending"))
}

async fn receive_callback(
    State(state): State<CallbackState>,
    payload: Result<Json<CallbackRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return ApiError::bad_request(rejection.body_text()).into_response(),
    };

    let outcome = state.verify(&request);
    let response = match &outcome {
        Ok(identity) => {
            info!(address = %identity.address, "Wallet signature verified");
            Json(CallbackResponse {
                success: true,
                address: identity.address.to_string(),
            })
            .into_response()
        }
        Err(e) => {
            warn!(error = %e, error_code = e.error_code(), "Callback rejected");
            e.clone().into_response()
        }
    };
    state.resolve(outcome);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::signature::tests::{sign, signer, OTHER_KEY, TEST_KEY};
    use crate::clock::ManualClock;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use chrono::Duration;
    use tower::ServiceExt;

    struct Fixture {
        router: Router,
        challenges: Arc<ChallengeSlot>,
        clock: Arc<ManualClock>,
        outcome: oneshot::Receiver<CallbackOutcome>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let challenges = Arc::new(ChallengeSlot::new());
        let (state, outcome) = CallbackState::new(1, challenges.clone(), clock.clone());
        Fixture {
            router: callback_router(state),
            challenges,
            clock,
            outcome,
        }
    }

    fn post_callback(body: &CallbackRequest) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/callback")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn signer_page_served_while_challenge_outstanding() {
        let fx = fixture();
        let challenge = fx.challenges.issue(1, fx.clock.now(), Duration::seconds(120)).unwrap();

        let response = fx
            .router
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains(&challenge.nonce));

        fx.challenges.clear(1);
        let response = fx
            .router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn valid_callback_verifies_and_resolves() {
        let fx = fixture();
        let challenge = fx.challenges.issue(1, fx.clock.now(), Duration::seconds(120)).unwrap();
        let wallet = signer(TEST_KEY);

        let response = fx
            .router
            .oneshot(post_callback(&CallbackRequest {
                address: format!("{:#x}", wallet.address()),
                signature: sign(&wallet, &challenge.message()),
                nonce: challenge.nonce.clone(),
            }))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["success"], true);

        let identity = fx.outcome.await.unwrap().unwrap();
        assert_eq!(identity.address, wallet.address());
    }

    #[tokio::test]
    async fn wrong_nonce_is_rejected() {
        let fx = fixture();
        let challenge = fx.challenges.issue(1, fx.clock.now(), Duration::seconds(120)).unwrap();
        let wallet = signer(TEST_KEY);

        let response = fx
            .router
            .oneshot(post_callback(&CallbackRequest {
                address: wallet.address().to_string(),
                signature: sign(&wallet, &challenge.message()),
                nonce: "00".repeat(32),
            }))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error_code"], "nonce_mismatch");

        assert_eq!(fx.outcome.await.unwrap(), Err(AuthError::NonceMismatch));
    }

    #[tokio::test]
    async fn signature_from_other_wallet_is_rejected() {
        let fx = fixture();
        let challenge = fx.challenges.issue(1, fx.clock.now(), Duration::seconds(120)).unwrap();

        let response = fx
            .router
            .oneshot(post_callback(&CallbackRequest {
                address: signer(TEST_KEY).address().to_string(),
                signature: sign(&signer(OTHER_KEY), &challenge.message()),
                nonce: challenge.nonce.clone(),
            }))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(matches!(
            fx.outcome.await.unwrap(),
            Err(AuthError::SignatureMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn expired_challenge_is_rejected() {
        let fx = fixture();
        let challenge = fx.challenges.issue(1, fx.clock.now(), Duration::seconds(120)).unwrap();
        let wallet = signer(TEST_KEY);
        fx.clock.advance(Duration::seconds(121));

        let response = fx
            .router
            .oneshot(post_callback(&CallbackRequest {
                address: wallet.address().to_string(),
                signature: sign(&wallet, &challenge.message()),
                nonce: challenge.nonce.clone(),
            }))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GONE);
        assert_eq!(fx.outcome.await.unwrap(), Err(AuthError::ChallengeExpired));
    }

    #[tokio::test]
    async fn malformed_body_does_not_resolve() {
        let mut fx = fixture();
        fx.challenges.issue(1, fx.clock.now(), Duration::seconds(120)).unwrap();

        let response = fx
            .router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/callback")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"address\":1}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
        assert_eq!(json_body(response).await["success"], false);
        assert!(fx.outcome.try_recv().is_err());
        assert!(fx.challenges.current(1).is_some());
    }
}
