//! GitHub as the identity provider
//!
//! Token exchange against `/login/oauth/access_token` and profile lookup
//! against `/user`. One attempt per call, bounded by the client timeout.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{Args, Secret};
use crate::services::identity::{IdentityProvider, ProviderProfile, ProviderToken};
use crate::types::{AuthError, BearerCredential};

/// Configuration for the GitHub provider
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub client_id: String,
    pub client_secret: Secret,
    /// Host of the OAuth token endpoint (default https://github.com)
    pub oauth_url: String,
    /// Base of the REST API (default https://api.github.com)
    pub api_url: String,
    /// Timeout for each HTTP round trip
    pub request_timeout: Duration,
}

impl GithubConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            client_id: args.github_client_id.clone().unwrap_or_default(),
            client_secret: args.github_client_secret.clone().unwrap_or_default(),
            oauth_url: args.github_oauth_url.trim_end_matches('/').to_string(),
            api_url: args.github_api_url.trim_end_matches('/').to_string(),
            request_timeout: args.provider_timeout(),
        }
    }
}

/// Body of the token endpoint. GitHub answers 200 with an `error` field
/// when the code is bad or expired.
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    #[serde(flatten)]
    token: ProviderToken,
    #[serde(default)]
    error: Option<String>,
}

/// GitHub OAuth and profile client
pub struct GithubProvider {
    config: GithubConfig,
    http_client: reqwest::Client,
}

impl GithubProvider {
    pub fn new(config: GithubConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("sardene-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            config,
            http_client,
        }
    }
}

/// Transport errors carry the request URL, which holds the client secret
/// on the token call; strip it before the error goes anywhere.
fn upstream(err: reqwest::Error) -> AuthError {
    AuthError::UpstreamFailure(err.without_url().to_string())
}

#[async_trait]
impl IdentityProvider for GithubProvider {
    async fn exchange_code(&self, code: &str) -> Result<ProviderToken, AuthError> {
        let url = format!("{}/login/oauth/access_token", self.config.oauth_url);

        let response = self
            .http_client
            .post(&url)
            .header("Accept", "application/json")
            .query(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose()),
                ("code", code),
            ])
            .send()
            .await
            .map_err(upstream)?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Token endpoint returned an error status");
            return Err(AuthError::UpstreamFailure(format!(
                "token endpoint answered HTTP {}",
                response.status()
            )));
        }

        let body: TokenEndpointResponse = response.json().await.map_err(upstream)?;

        if let Some(error) = body.error {
            debug!(error = %error, "Token endpoint rejected the code");
            return Err(AuthError::InvalidCode);
        }

        Ok(body.token)
    }

    async fn fetch_profile(
        &self,
        credential: &BearerCredential,
    ) -> Result<ProviderProfile, AuthError> {
        let url = format!("{}/user", self.config.api_url);

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .bearer_auth(credential.as_str())
            .send()
            .await
            .map_err(upstream)?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(AuthError::InvalidIdentity);
            }
            status => {
                warn!(status = %status, "Profile endpoint returned an error status");
                return Err(AuthError::UpstreamFailure(format!(
                    "profile endpoint answered HTTP {}",
                    status
                )));
            }
        }

        response.json().await.map_err(upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::body::Incoming;
    use hyper::{Request, Response};
    use hyper_util::rt::TokioIo;
    use std::convert::Infallible;
    use tokio::net::TcpListener;

    /// Serve the same canned response to every request; returns the base URL.
    async fn canned_server(status: u16, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let service = service_fn(move |_req: Request<Incoming>| async move {
                        Ok::<_, Infallible>(
                            Response::builder()
                                .status(status)
                                .header("Content-Type", "application/json")
                                .body(Full::new(Bytes::from_static(body.as_bytes())))
                                .unwrap(),
                        )
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        format!("http://{}", addr)
    }

    fn provider(base: &str) -> GithubProvider {
        GithubProvider::new(GithubConfig {
            client_id: "client".into(),
            client_secret: "top-secret-value".parse().unwrap(),
            oauth_url: base.into(),
            api_url: base.into(),
            request_timeout: Duration::from_secs(2),
        })
    }

    #[tokio::test]
    async fn test_exchange_code_success() {
        let base = canned_server(
            200,
            r#"{"access_token":"gho_abc","token_type":"bearer","scope":"read:user"}"#,
        )
        .await;

        let token = provider(&base).exchange_code("abc123").await.unwrap();
        assert_eq!(token.access_token, "gho_abc");
        assert_eq!(token.scope, "read:user");
    }

    #[tokio::test]
    async fn test_exchange_code_bad_verification_code() {
        let base = canned_server(
            200,
            r#"{"error":"bad_verification_code","error_description":"The code passed is incorrect or expired."}"#,
        )
        .await;

        let err = provider(&base).exchange_code("expired").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCode);
    }

    #[tokio::test]
    async fn test_exchange_code_malformed_body_is_upstream_failure() {
        let base = canned_server(200, "<html>rate limited</html>").await;

        let err = provider(&base).exchange_code("abc").await.unwrap_err();
        assert!(matches!(err, AuthError::UpstreamFailure(_)));
    }

    #[tokio::test]
    async fn test_unreachable_provider_does_not_leak_secret() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = provider(&base).exchange_code("abc").await.unwrap_err();
        match err {
            AuthError::UpstreamFailure(message) => {
                assert!(!message.contains("top-secret-value"), "{}", message)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_profile_success() {
        let base = canned_server(200, r#"{"id":1001,"login":"alice","name":null}"#).await;

        let profile = provider(&base)
            .fetch_profile(&BearerCredential::new("gho_abc"))
            .await
            .unwrap();
        assert_eq!(profile.id, 1001);
        assert_eq!(profile.login.as_deref(), Some("alice"));
        assert_eq!(profile.name, None);
    }

    #[tokio::test]
    async fn test_fetch_profile_without_id_is_upstream_failure() {
        let base = canned_server(200, r#"{"login":"alice"}"#).await;

        let err = provider(&base)
            .fetch_profile(&BearerCredential::new("gho_abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UpstreamFailure(_)));
    }

    #[tokio::test]
    async fn test_fetch_profile_rejected_credential() {
        let base = canned_server(401, r#"{"message":"Bad credentials"}"#).await;

        let err = provider(&base)
            .fetch_profile(&BearerCredential::new("revoked"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidIdentity);
    }
}
