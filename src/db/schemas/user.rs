//! User directory document schema
//!
//! One document per provider identity, written once on first sign-in.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;
use crate::types::Identity;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Provider-issued numeric user id
    pub github_id: i64,

    /// Login handle at provisioning time
    pub login: String,

    /// Display name at provisioning time
    #[serde(default)]
    pub name: String,
}

impl UserDoc {
    /// Create a new user document from a verified identity
    pub fn new(identity: &Identity) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            github_id: identity.id,
            login: identity.login.clone(),
            name: identity.name.clone(),
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One directory entry per provider identity
            (
                doc! { "github_id": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("github_id_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "login": 1 },
                Some(IndexOptions::builder().name("login_index".to_string()).build()),
            ),
        ]
    }
}
