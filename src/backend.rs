// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access backend client.
//!
//! The backend checks that a wallet may open a record and hands out the
//! record's key material and content address. It also proxies ciphertext
//! downloads from the content-addressed network.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;
use zeroize::Zeroizing;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend URL is invalid: {0}")]
    InvalidUrl(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("backend request failed: {0}")]
    Request(String),

    #[error("backend response was invalid: {0}")]
    InvalidResponse(String),
}

/// Key material and content address for a record the wallet may open.
pub struct AccessGrant {
    pub key_material: Zeroizing<String>,
    pub content_address: String,
}

impl std::fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGrant")
            .field("key_material", &"***")
            .field("content_address", &self.content_address)
            .finish()
    }
}

/// Source of access grants and ciphertext.
pub trait AccessBackend: Send + Sync + 'static {
    fn verify_access(
        &self,
        record_id: &str,
        wallet_address: &str,
    ) -> impl Future<Output = Result<AccessGrant, BackendError>> + Send;

    fn fetch_content(
        &self,
        content_address: &str,
    ) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyAccessRequest<'a> {
    record_id: &'a str,
    wallet_address: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyAccessResponse {
    success: bool,
    #[serde(default)]
    key_material: Option<String>,
    #[serde(default)]
    content_address: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP implementation against the backend's JSON API.
#[derive(Debug, Clone)]
pub struct HttpAccessBackend {
    base_url: Url,
    http: Client,
}

impl HttpAccessBackend {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| BackendError::InvalidUrl(e.to_string()))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::InvalidUrl(e.to_string()))
    }

    fn content_url(&self, content_address: &str) -> Result<Url, BackendError> {
        let mut url = self.endpoint("api/content/")?;
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl("backend URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(content_address);
        Ok(url)
    }
}

impl AccessBackend for HttpAccessBackend {
    async fn verify_access(
        &self,
        record_id: &str,
        wallet_address: &str,
    ) -> Result<AccessGrant, BackendError> {
        let url = self.endpoint("api/verify-access")?;
        debug!(record_id, "Verifying record access");

        let response = self
            .http
            .post(url)
            .json(&VerifyAccessRequest {
                record_id,
                wallet_address,
            })
            .send()
            .await
            .map_err(|e| BackendError::Request(format!("POST verify-access failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Request(format!("reading verify-access body: {e}")))?;

        // Denials arrive as `{success: false, error}`, usually with a 4xx.
        let parsed: VerifyAccessResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(BackendError::Request(format!(
                    "verify-access returned {status}: {body}"
                )))
            }
            Err(e) => {
                return Err(BackendError::InvalidResponse(format!(
                    "verify-access invalid JSON: {e}"
                )))
            }
        };

        if !parsed.success {
            return Err(BackendError::AccessDenied(
                parsed.error.unwrap_or_else(|| format!("backend returned {status}")),
            ));
        }

        match (parsed.key_material, parsed.content_address) {
            (Some(key_material), Some(content_address)) => {
                info!(record_id, "Record access granted");
                Ok(AccessGrant {
                    key_material: Zeroizing::new(key_material),
                    content_address,
                })
            }
            _ => Err(BackendError::InvalidResponse(
                "verify-access response missing keyMaterial or contentAddress".to_string(),
            )),
        }
    }

    async fn fetch_content(&self, content_address: &str) -> Result<Vec<u8>, BackendError> {
        let url = self.content_url(content_address)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| BackendError::Request(format!("GET content failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Request(format!(
                "GET content returned {status}: {body}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::Request(format!("reading content body: {e}")))?;
        debug!(size = bytes.len(), "Downloaded ciphertext");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    async fn verify_handler(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if body["walletAddress"] == "0xallowed" && body["recordId"] == "7" {
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "keyMaterial": "a2V5",
                    "contentAddress": "bafy/with space",
                })),
            )
        } else {
            (
                StatusCode::FORBIDDEN,
                Json(json!({ "success": false, "error": "rental expired" })),
            )
        }
    }

    async fn content_handler(Path(address): Path<String>) -> Result<Vec<u8>, StatusCode> {
        if address == "bafy/with space" {
            Ok(b"ciphertext".to_vec())
        } else {
            Err(StatusCode::NOT_FOUND)
        }
    }

    async fn mock_backend() -> String {
        let router = Router::new()
            .route("/prefix/api/verify-access", post(verify_handler))
            .route("/prefix/api/content/{address}", get(content_handler));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/prefix")
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let backend = HttpAccessBackend::new("https://backend.example/v1").unwrap();
        assert_eq!(backend.base_url().as_str(), "https://backend.example/v1/");
        assert_eq!(
            backend.endpoint("api/verify-access").unwrap().as_str(),
            "https://backend.example/v1/api/verify-access"
        );
    }

    #[test]
    fn content_address_is_escaped() {
        let backend = HttpAccessBackend::new("https://backend.example").unwrap();
        assert_eq!(
            backend.content_url("a/b c").unwrap().as_str(),
            "https://backend.example/api/content/a%2Fb%20c"
        );
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(matches!(
            HttpAccessBackend::new("not a url"),
            Err(BackendError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn grants_and_downloads() {
        let backend = HttpAccessBackend::new(&mock_backend().await).unwrap();

        let grant = backend.verify_access("7", "0xallowed").await.unwrap();
        assert_eq!(grant.key_material.as_str(), "a2V5");
        assert_eq!(grant.content_address, "bafy/with space");
        assert!(!format!("{grant:?}").contains("a2V5"));

        let content = backend.fetch_content(&grant.content_address).await.unwrap();
        assert_eq!(content, b"ciphertext");
    }

    #[tokio::test]
    async fn denial_carries_backend_reason() {
        let backend = HttpAccessBackend::new(&mock_backend().await).unwrap();
        let err = backend.verify_access("7", "0xother").await.unwrap_err();
        match err {
            BackendError::AccessDenied(reason) => assert_eq!(reason, "rental expired"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_content_is_request_error() {
        let backend = HttpAccessBackend::new(&mock_backend().await).unwrap();
        let err = backend.fetch_content("unknown").await.unwrap_err();
        assert!(matches!(err, BackendError::Request(_)));
    }
}
