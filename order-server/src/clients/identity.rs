//! Identity service client
//!
//! Resolves the opaque token presented by a caller into the user that owns
//! it. A token the identity service does not recognise is not an error: it
//! resolves to `None` and the caller decides what to do.

use super::{ClientError, ClientResult};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User record returned by the identity service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: i64,
    #[serde(default)]
    pub display_name: String,
    pub username: String,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Token → identity resolution
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// `Ok(None)` when the token does not resolve to a user
    async fn verify(&self, token: &str) -> ClientResult<Option<UserIdentity>>;
}

/// Identity verifier backed by the auth service HTTP API
///
/// `GET {base_url}/api/users/me` with the token as bearer credential.
#[derive(Debug, Clone)]
pub struct HttpIdentityVerifier {
    base_url: String,
    client: reqwest::Client,
}

impl HttpIdentityVerifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, token: &str) -> ClientResult<Option<UserIdentity>> {
        if token.trim().is_empty() {
            return Ok(None);
        }

        let resp = self
            .client
            .get(format!("{}/api/users/me", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;

        match resp.status() {
            status if status.is_success() => {
                let identity: UserIdentity = resp.json().await?;
                tracing::debug!(user_id = identity.id, "Token resolved");
                Ok(Some(identity))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                tracing::debug!(status = %resp.status(), "Token rejected by identity service");
                Ok(None)
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(ClientError::UnexpectedStatus {
                    service: "identity",
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::HeaderMap, routing::get};

    async fn me(headers: HeaderMap) -> Result<Json<UserIdentity>, axum::http::StatusCode> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        match auth {
            "Bearer good-token" => Ok(Json(UserIdentity {
                id: 7,
                display_name: "Jane".to_string(),
                username: "jane".to_string(),
                created_at: None,
                updated_at: None,
            })),
            "Bearer broken" => Err(axum::http::StatusCode::INTERNAL_SERVER_ERROR),
            _ => Err(axum::http::StatusCode::UNAUTHORIZED),
        }
    }

    async fn spawn_identity_service() -> String {
        let app = Router::new().route("/api/users/me", get(me));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_verify_known_token() {
        let url = spawn_identity_service().await;
        let verifier = HttpIdentityVerifier::new(url, Duration::from_secs(5)).unwrap();

        let identity = verifier.verify("good-token").await.unwrap().unwrap();
        assert_eq!(identity.id, 7);
        assert_eq!(identity.username, "jane");
    }

    #[tokio::test]
    async fn test_verify_rejected_token() {
        let url = spawn_identity_service().await;
        let verifier = HttpIdentityVerifier::new(url, Duration::from_secs(5)).unwrap();

        assert!(verifier.verify("bad-token").await.unwrap().is_none());
        assert!(verifier.verify("  ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verify_server_error_propagates() {
        let url = spawn_identity_service().await;
        let verifier = HttpIdentityVerifier::new(url, Duration::from_secs(5)).unwrap();

        let err = verifier.verify("broken").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedStatus { status: 500, .. }
        ));
    }
}
