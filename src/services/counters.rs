//! Denormalized engagement counters on the idea document

use bson::oid::ObjectId;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::db::IdeaStore;
use crate::services::with_deadline;
use crate::types::{EngagementKind, NotFoundError, Result, StorageError};

#[derive(Clone)]
pub struct CounterSync {
    ideas: Arc<dyn IdeaStore>,
    write_timeout: Duration,
}

impl CounterSync {
    pub fn new(ideas: Arc<dyn IdeaStore>, write_timeout: Duration) -> Self {
        Self {
            ideas,
            write_timeout,
        }
    }

    /// Add exactly one to the counter for `kind` with a server-side increment.
    /// Fails with `IdeaMissing` if the idea vanished since the ledger insert.
    pub async fn apply_engagement_effect(&self, idea_id: ObjectId, kind: EngagementKind) -> Result<()> {
        let matched = with_deadline(
            self.write_timeout,
            "counter increment",
            self.ideas.increment_counter(idea_id, kind),
        )
        .await?;

        if !matched {
            return Err(NotFoundError::IdeaMissing.into());
        }

        debug!(idea_id = %idea_id, field = kind.counter_field(), "Counter incremented");
        Ok(())
    }

    /// Current value of the counter for `kind`, or `None` if the idea is gone
    pub async fn current_count(
        &self,
        idea_id: ObjectId,
        kind: EngagementKind,
    ) -> std::result::Result<Option<i64>, StorageError> {
        let idea = with_deadline(
            self.write_timeout,
            "counter read",
            self.ideas.find_by_id(idea_id),
        )
        .await?;
        Ok(idea.map(|idea| idea.counter(kind)))
    }
}
