//! Engagement ledger
//!
//! At-most-one record per (user, idea, kind). The guarantee comes from the
//! unique index behind [`EngagementStore::insert`]; there is no read-before-write
//! check on the record itself.

use bson::oid::ObjectId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::db::schemas::EngagementDoc;
use crate::db::{EngagementStore, IdeaStore, InsertOutcome};
use crate::services::with_deadline;
use crate::types::{
    ConflictError, EngagementKind, EngagementRecord, EngagementState, NotFoundError, Result,
    StorageError,
};

/// Attempts made to remove a ledger write that must not stand
const COMPENSATION_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct EngagementLedger {
    ideas: Arc<dyn IdeaStore>,
    engagements: Arc<dyn EngagementStore>,
    write_timeout: Duration,
}

impl EngagementLedger {
    pub fn new(
        ideas: Arc<dyn IdeaStore>,
        engagements: Arc<dyn EngagementStore>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            ideas,
            engagements,
            write_timeout,
        }
    }

    /// Register the (user, idea, kind) triple.
    ///
    /// Fails with `IdeaMissing` when the idea does not exist and with
    /// `AlreadyEngaged` when the unique index rejects the insert. An insert
    /// that outlives its deadline may still have been applied, so its write
    /// is removed before the timeout is reported.
    pub async fn record_engagement(
        &self,
        user_id: i64,
        idea_id: ObjectId,
        kind: EngagementKind,
    ) -> Result<EngagementRecord> {
        let idea = with_deadline(
            self.write_timeout,
            "idea lookup",
            self.ideas.find_by_id(idea_id),
        )
        .await?;

        if idea.is_none() {
            return Err(NotFoundError::IdeaMissing.into());
        }

        let doc = EngagementDoc::new(user_id, idea_id, kind);
        let outcome = match with_deadline(
            self.write_timeout,
            "ledger insert",
            self.engagements.insert(doc.clone()),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(timeout @ StorageError::Timeout(_)) => {
                warn!(user_id, idea_id = %idea_id, %kind, "Ledger insert outcome unknown, removing it");
                self.compensate(&EngagementRecord::from(doc)).await?;
                return Err(timeout.into());
            }
            Err(e) => return Err(e.into()),
        };

        match outcome {
            InsertOutcome::Inserted => {
                info!(user_id, idea_id = %idea_id, %kind, "Engagement recorded");
                Ok(doc.into())
            }
            InsertOutcome::Duplicate => {
                debug!(user_id, idea_id = %idea_id, %kind, "Engagement already recorded");
                Err(ConflictError::AlreadyEngaged.into())
            }
        }
    }

    /// Every record held for a user, oldest first
    pub async fn list_engagements(&self, user_id: i64) -> Result<Vec<EngagementRecord>> {
        let docs = with_deadline(
            self.write_timeout,
            "ledger list",
            self.engagements.list_for_user(user_id),
        )
        .await?;
        Ok(docs.into_iter().map(EngagementRecord::from).collect())
    }

    /// Remove a record whose counter effect never applied.
    ///
    /// Only the engagement unit calls this; the ledger is otherwise append-only.
    pub async fn revoke_engagement(
        &self,
        record: &EngagementRecord,
    ) -> std::result::Result<bool, StorageError> {
        with_deadline(
            self.write_timeout,
            "ledger compensation",
            self.engagements.remove(record),
        )
        .await
    }

    /// Number of records of `kind` held against an idea
    pub async fn count_engagements(
        &self,
        idea_id: ObjectId,
        kind: EngagementKind,
    ) -> std::result::Result<u64, StorageError> {
        with_deadline(
            self.write_timeout,
            "ledger count",
            self.engagements.count_for_idea(idea_id, kind),
        )
        .await
    }

    /// Revoke `record`, retrying a failed removal. When every attempt fails
    /// the record is left in place and logged with its key.
    pub async fn compensate(
        &self,
        record: &EngagementRecord,
    ) -> std::result::Result<(), StorageError> {
        let mut last_error = None;

        for attempt in 1..=COMPENSATION_ATTEMPTS {
            match self.revoke_engagement(record).await {
                Ok(_) => {
                    debug!(state = ?EngagementState::Unengaged, "Ledger record compensated");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Compensation attempt failed");
                    last_error = Some(e);
                }
            }
        }

        error!(
            user_id = record.user_id,
            idea_id = %record.idea_id,
            kind = %record.kind,
            state = ?EngagementState::Engaged,
            "Ledger record left without its counter effect"
        );
        Err(last_error.unwrap_or_else(|| StorageError::Unavailable("compensation failed".into())))
    }
}
