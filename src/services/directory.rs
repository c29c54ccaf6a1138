//! User directory
//!
//! Provisions a local record the first time an identity signs in. The
//! record is never updated afterwards.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::db::schemas::UserDoc;
use crate::db::{InsertOutcome, UserStore};
use crate::services::with_deadline;
use crate::types::{Identity, StorageError};

/// What `ensure_provisioned` found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioning {
    /// This call wrote the directory record
    Created,
    /// A record already existed (or a concurrent caller won the insert)
    Existing,
}

#[derive(Clone)]
pub struct UserDirectory {
    users: Arc<dyn UserStore>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UserStore>, read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            users,
            read_timeout,
            write_timeout,
        }
    }

    /// Make sure a directory record exists for `identity`. First write wins.
    pub async fn ensure_provisioned(&self, identity: &Identity) -> Result<Provisioning, StorageError> {
        let existing = with_deadline(
            self.read_timeout,
            "directory lookup",
            self.users.find_by_github_id(identity.id),
        )
        .await?;

        if existing.is_some() {
            debug!(user_id = identity.id, "Identity already provisioned");
            return Ok(Provisioning::Existing);
        }

        let outcome = with_deadline(
            self.write_timeout,
            "directory insert",
            self.users.insert(UserDoc::new(identity)),
        )
        .await?;

        match outcome {
            InsertOutcome::Inserted => {
                info!(user_id = identity.id, login = %identity.login, "Provisioned new user");
                Ok(Provisioning::Created)
            }
            InsertOutcome::Duplicate => {
                debug!(user_id = identity.id, "Lost provisioning race; record already present");
                Ok(Provisioning::Existing)
            }
        }
    }
}
