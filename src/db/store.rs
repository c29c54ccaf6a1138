//! Storage seams
//!
//! Services depend on these traits rather than on a database handle, so the
//! same code runs against MongoDB in production and the in-memory store in
//! tests and dev mode.

use async_trait::async_trait;
use bson::oid::ObjectId;
use std::sync::Arc;

use crate::db::memory::MemoryStore;
use crate::db::mongo::MongoClient;
use crate::db::mongo_store::{MongoEngagementStore, MongoIdeaStore, MongoUserStore};
use crate::db::schemas::{EngagementDoc, IdeaChanges, IdeaDoc, UserDoc};
use crate::types::{EngagementKind, EngagementRecord, StorageError};

/// Outcome of an insert guarded by a unique index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The unique constraint rejected the document
    Duplicate,
}

/// Idea repository: plain CRUD plus the atomic counter increment
#[async_trait]
pub trait IdeaStore: Send + Sync {
    async fn insert(&self, idea: IdeaDoc) -> Result<(), StorageError>;

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<IdeaDoc>, StorageError>;

    /// All ideas, newest first
    async fn list(&self) -> Result<Vec<IdeaDoc>, StorageError>;

    /// Returns whether an idea matched
    async fn update_fields(&self, id: ObjectId, changes: IdeaChanges) -> Result<bool, StorageError>;

    /// Returns whether an idea matched
    async fn delete(&self, id: ObjectId) -> Result<bool, StorageError>;

    /// Add one to the counter for `kind` in a single server-side operation.
    /// Returns whether an idea matched.
    async fn increment_counter(
        &self,
        id: ObjectId,
        kind: EngagementKind,
    ) -> Result<bool, StorageError>;
}

/// Directory of provisioned identities
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_github_id(&self, github_id: i64) -> Result<Option<UserDoc>, StorageError>;

    /// Insert guarded by the unique index on `github_id`
    async fn insert(&self, user: UserDoc) -> Result<InsertOutcome, StorageError>;
}

/// Append-only engagement ledger
#[async_trait]
pub trait EngagementStore: Send + Sync {
    /// Insert guarded by the unique index on (user_id, idea_id, kind)
    async fn insert(&self, engagement: EngagementDoc) -> Result<InsertOutcome, StorageError>;

    /// Remove the ledger write behind `record`, and nothing written by a
    /// concurrent request for the same triple. Only used for compensation.
    async fn remove(&self, record: &EngagementRecord) -> Result<bool, StorageError>;

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<EngagementDoc>, StorageError>;

    /// Number of records of `kind` held against one idea
    async fn count_for_idea(&self, idea_id: ObjectId, kind: EngagementKind)
        -> Result<u64, StorageError>;
}

/// The set of stores a running instance is wired with
#[derive(Clone)]
pub struct Stores {
    pub ideas: Arc<dyn IdeaStore>,
    pub users: Arc<dyn UserStore>,
    pub engagements: Arc<dyn EngagementStore>,
}

impl Stores {
    /// MongoDB-backed stores. Creates indexes once, here.
    pub async fn mongo(client: &MongoClient) -> Result<Self, StorageError> {
        Ok(Self {
            ideas: Arc::new(MongoIdeaStore::new(client).await?),
            users: Arc::new(MongoUserStore::new(client).await?),
            engagements: Arc::new(MongoEngagementStore::new(client).await?),
        })
    }

    /// All three stores backed by one in-memory store
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            ideas: store.clone(),
            users: store.clone(),
            engagements: store,
        }
    }
}
