//! Verified identities and the bearer credential that proves them

use serde::{Deserialize, Serialize};
use std::fmt;

/// A verified external user reference, as issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable provider-issued numeric id
    pub id: i64,
    /// Login handle
    pub login: String,
    /// Display name (may be empty; providers allow unset names)
    #[serde(default)]
    pub name: String,
}

/// Opaque provider-issued access token.
///
/// Passed through from the provider to the client and back; never minted,
/// stored, or logged by this service.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerCredential(String);

impl BearerCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerCredential(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = BearerCredential::new("gho_abcdef");
        assert_eq!(format!("{:?}", cred), "BearerCredential(***)");
        assert_eq!(cred.as_str(), "gho_abcdef");
    }
}
