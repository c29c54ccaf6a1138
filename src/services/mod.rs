//! Services for Sardene
//!
//! - Identity resolution against the OAuth provider (GitHub)
//! - User directory provisioning
//! - Engagement ledger and counter sync
//! - The auth gateway that composes them per request
//! - Plain idea catalog operations

pub mod counters;
pub mod directory;
pub mod gateway;
pub mod github;
pub mod identity;
pub mod ideas;
pub mod ledger;

pub use counters::CounterSync;
pub use directory::{Provisioning, UserDirectory};
pub use gateway::{parse_idea_id, AuthGateway, AuthGrant};
pub use github::{GithubConfig, GithubProvider};
pub use identity::{
    parse_bearer_header, IdentityProvider, IdentityResolver, ProviderProfile, ProviderToken,
};
pub use ideas::{IdeaCatalog, IdeaDraft};
pub use ledger::EngagementLedger;

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::types::StorageError;

/// Run a storage call under a deadline. Expiry becomes [`StorageError::Timeout`].
pub(crate) async fn with_deadline<T, F>(
    limit: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, ?limit, "Storage deadline exceeded");
            Err(StorageError::Timeout(operation))
        }
    }
}
