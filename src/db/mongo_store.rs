//! MongoDB implementations of the storage traits

use async_trait::async_trait;
use bson::{doc, oid::ObjectId};

use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{
    EngagementDoc, IdeaChanges, IdeaDoc, UserDoc, ENGAGEMENT_COLLECTION, IDEA_COLLECTION,
    USER_COLLECTION,
};
use crate::db::store::{EngagementStore, IdeaStore, InsertOutcome, UserStore};
use crate::types::{EngagementKind, EngagementRecord, StorageError};

/// MongoDB-backed idea repository
pub struct MongoIdeaStore {
    ideas: MongoCollection<IdeaDoc>,
}

impl MongoIdeaStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self, StorageError> {
        Ok(Self {
            ideas: mongo.collection(IDEA_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl IdeaStore for MongoIdeaStore {
    async fn insert(&self, idea: IdeaDoc) -> Result<(), StorageError> {
        match self.ideas.insert_one(idea).await? {
            InsertOutcome::Inserted => Ok(()),
            // Ids are generated client-side; a clash means the generator misbehaved
            InsertOutcome::Duplicate => Err(StorageError::Unavailable(
                "Generated idea id already exists".into(),
            )),
        }
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<IdeaDoc>, StorageError> {
        self.ideas.find_one(doc! { "_id": id }).await
    }

    async fn list(&self) -> Result<Vec<IdeaDoc>, StorageError> {
        self.ideas
            .find_many(doc! {}, Some(doc! { "created_at": -1 }))
            .await
    }

    async fn update_fields(&self, id: ObjectId, changes: IdeaChanges) -> Result<bool, StorageError> {
        let result = self
            .ideas
            .update_one(doc! { "_id": id }, doc! { "$set": changes.to_set_document() })
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, StorageError> {
        let result = self.ideas.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn increment_counter(
        &self,
        id: ObjectId,
        kind: EngagementKind,
    ) -> Result<bool, StorageError> {
        let field = kind.counter_field();
        let result = self
            .ideas
            .update_one(doc! { "_id": id }, doc! { "$inc": { field: 1_i64 } })
            .await?;
        Ok(result.matched_count > 0)
    }
}

/// MongoDB-backed user directory
pub struct MongoUserStore {
    users: MongoCollection<UserDoc>,
}

impl MongoUserStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self, StorageError> {
        Ok(Self {
            users: mongo.collection(USER_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_by_github_id(&self, github_id: i64) -> Result<Option<UserDoc>, StorageError> {
        self.users.find_one(doc! { "github_id": github_id }).await
    }

    async fn insert(&self, user: UserDoc) -> Result<InsertOutcome, StorageError> {
        self.users.insert_one(user).await
    }
}

/// MongoDB-backed engagement ledger
pub struct MongoEngagementStore {
    engagements: MongoCollection<EngagementDoc>,
}

impl MongoEngagementStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self, StorageError> {
        Ok(Self {
            engagements: mongo.collection(ENGAGEMENT_COLLECTION).await?,
        })
    }
}

#[async_trait]
impl EngagementStore for MongoEngagementStore {
    async fn insert(&self, engagement: EngagementDoc) -> Result<InsertOutcome, StorageError> {
        self.engagements.insert_one(engagement).await
    }

    async fn remove(&self, record: &EngagementRecord) -> Result<bool, StorageError> {
        let result = self
            .engagements
            .delete_one(EngagementDoc::entry_filter(record))
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<EngagementDoc>, StorageError> {
        self.engagements
            .find_many(doc! { "user_id": user_id }, Some(doc! { "_id": 1 }))
            .await
    }

    async fn count_for_idea(
        &self,
        idea_id: ObjectId,
        kind: EngagementKind,
    ) -> Result<u64, StorageError> {
        self.engagements
            .count(EngagementDoc::idea_filter(idea_id, kind))
            .await
    }
}
