//! In-memory implementation of the storage traits
//!
//! Used in dev mode when MongoDB is unreachable, and by tests. Each map entry
//! is guarded by its dashmap shard lock, so the `entry` API gives the same
//! insert-if-absent guarantee the unique indexes give in MongoDB.

use async_trait::async_trait;
use bson::oid::ObjectId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::db::schemas::{EngagementDoc, IdeaChanges, IdeaDoc, UserDoc};
use crate::db::store::{EngagementStore, IdeaStore, InsertOutcome, UserStore};
use crate::types::{EngagementKind, EngagementRecord, StorageError};

type EngagementKey = (i64, ObjectId, EngagementKind);

#[derive(Default)]
pub struct MemoryStore {
    ideas: DashMap<ObjectId, IdeaDoc>,
    users: DashMap<i64, UserDoc>,
    engagements: DashMap<EngagementKey, EngagementDoc>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn engagement_count(&self) -> usize {
        self.engagements.len()
    }
}

#[async_trait]
impl IdeaStore for MemoryStore {
    async fn insert(&self, idea: IdeaDoc) -> Result<(), StorageError> {
        match self.ideas.entry(idea.id) {
            Entry::Occupied(_) => Err(StorageError::Unavailable(
                "Generated idea id already exists".into(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(idea);
                Ok(())
            }
        }
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<Option<IdeaDoc>, StorageError> {
        Ok(self.ideas.get(&id).map(|idea| idea.clone()))
    }

    async fn list(&self) -> Result<Vec<IdeaDoc>, StorageError> {
        let mut ideas: Vec<IdeaDoc> = self.ideas.iter().map(|e| e.value().clone()).collect();
        ideas.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(ideas)
    }

    async fn update_fields(&self, id: ObjectId, changes: IdeaChanges) -> Result<bool, StorageError> {
        let Some(mut idea) = self.ideas.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(name) = changes.name {
            idea.name = name;
        }
        if let Some(description) = changes.description {
            idea.description = description;
        }
        Ok(true)
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, StorageError> {
        Ok(self.ideas.remove(&id).is_some())
    }

    async fn increment_counter(
        &self,
        id: ObjectId,
        kind: EngagementKind,
    ) -> Result<bool, StorageError> {
        let Some(mut idea) = self.ideas.get_mut(&id) else {
            return Ok(false);
        };
        match kind {
            EngagementKind::Like => idea.gazers += 1,
            EngagementKind::Make => idea.makers += 1,
        }
        Ok(true)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_github_id(&self, github_id: i64) -> Result<Option<UserDoc>, StorageError> {
        Ok(self.users.get(&github_id).map(|u| u.clone()))
    }

    async fn insert(&self, user: UserDoc) -> Result<InsertOutcome, StorageError> {
        match self.users.entry(user.github_id) {
            Entry::Occupied(_) => Ok(InsertOutcome::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(user);
                Ok(InsertOutcome::Inserted)
            }
        }
    }
}

#[async_trait]
impl EngagementStore for MemoryStore {
    async fn insert(&self, engagement: EngagementDoc) -> Result<InsertOutcome, StorageError> {
        let key = (engagement.user_id, engagement.idea_id, engagement.kind);
        match self.engagements.entry(key) {
            Entry::Occupied(_) => Ok(InsertOutcome::Duplicate),
            Entry::Vacant(slot) => {
                slot.insert(engagement);
                Ok(InsertOutcome::Inserted)
            }
        }
    }

    async fn remove(&self, record: &EngagementRecord) -> Result<bool, StorageError> {
        let key = (record.user_id, record.idea_id, record.kind);
        Ok(self
            .engagements
            .remove_if(&key, |_, doc| doc.id == record.entry_id)
            .is_some())
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<EngagementDoc>, StorageError> {
        let mut records: Vec<EngagementDoc> = self
            .engagements
            .iter()
            .filter(|e| e.key().0 == user_id)
            .map(|e| e.value().clone())
            .collect();
        records.sort_by(|a, b| {
            a.metadata
                .created_at
                .cmp(&b.metadata.created_at)
                .then(a.idea_id.cmp(&b.idea_id))
        });
        Ok(records)
    }

    async fn count_for_idea(
        &self,
        idea_id: ObjectId,
        kind: EngagementKind,
    ) -> Result<u64, StorageError> {
        let count = self
            .engagements
            .iter()
            .filter(|e| e.key().1 == idea_id && e.key().2 == kind)
            .count();
        Ok(count as u64)
    }
}
