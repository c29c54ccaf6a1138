//! Identity resolution
//!
//! Turns an OAuth code or a bearer credential into a verified [`Identity`]
//! by asking the provider. Header parsing is pure and happens before any
//! network call.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::types::{AuthError, BearerCredential, Identity};

/// Access token grant returned by the provider's token endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderToken {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

/// User profile returned by the provider's profile endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderProfile {
    pub id: i64,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// The two provider endpoints the resolver relies on.
///
/// Implementations map a rejected code to [`AuthError::InvalidCode`], a
/// rejected credential to [`AuthError::InvalidIdentity`], and transport or
/// decoding problems to [`AuthError::UpstreamFailure`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<ProviderToken, AuthError>;

    async fn fetch_profile(
        &self,
        credential: &BearerCredential,
    ) -> Result<ProviderProfile, AuthError>;
}

/// Parse an `Authorization` header value of the exact form `Bearer <token>`.
pub fn parse_bearer_header(raw: Option<&str>) -> Result<BearerCredential, AuthError> {
    let token = raw
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or(AuthError::InvalidHeaderFormat)?;

    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return Err(AuthError::InvalidHeaderFormat);
    }

    Ok(BearerCredential::new(token))
}

/// A profile without a positive id is malformed. One without a login is
/// well-formed but not usable, which the caller maps to its own error.
fn identity_from_profile(profile: ProviderProfile) -> Result<Option<Identity>, AuthError> {
    if profile.id <= 0 {
        return Err(AuthError::UpstreamFailure(format!(
            "profile carried invalid id {}",
            profile.id
        )));
    }

    Ok(profile
        .login
        .filter(|login| !login.trim().is_empty())
        .map(|login| Identity {
            id: profile.id,
            login,
            name: profile.name.unwrap_or_default(),
        }))
}

/// Exchanges codes and credentials for verified identities
#[derive(Clone)]
pub struct IdentityResolver {
    provider: Arc<dyn IdentityProvider>,
}

impl IdentityResolver {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Exchange an OAuth code for the identity behind it and its access token
    pub async fn exchange_code(
        &self,
        code: &str,
    ) -> Result<(Identity, BearerCredential, ProviderToken), AuthError> {
        let token = self.provider.exchange_code(code).await?;

        if token.access_token.is_empty() {
            debug!("Provider returned an empty access token");
            return Err(AuthError::InvalidCode);
        }

        let credential = BearerCredential::new(token.access_token.clone());
        let profile = match self.provider.fetch_profile(&credential).await {
            Ok(profile) => profile,
            // A freshly issued token that the profile endpoint refuses means
            // the code did not map to a usable account
            Err(AuthError::InvalidIdentity) => return Err(AuthError::InvalidCode),
            Err(e) => return Err(e),
        };

        let identity = identity_from_profile(profile)?.ok_or(AuthError::InvalidCode)?;
        Ok((identity, credential, token))
    }

    /// Validate the raw `Authorization` header. No network call.
    pub fn validate_bearer_header(&self, raw: Option<&str>) -> Result<BearerCredential, AuthError> {
        parse_bearer_header(raw)
    }

    /// Resolve the identity a bearer credential belongs to
    pub async fn resolve_identity(&self, credential: &BearerCredential) -> Result<Identity, AuthError> {
        let profile = self.provider.fetch_profile(credential).await?;

        identity_from_profile(profile)?.ok_or_else(|| {
            warn!("Provider profile carried no login");
            AuthError::InvalidIdentity
        })
    }
}
