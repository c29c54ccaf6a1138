//! Engagement kinds, records, and the per-pair state machine

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a user did to an idea
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
    /// "Gaze": the user likes the idea
    Like,
    /// The user is building the idea
    Make,
}

impl EngagementKind {
    /// Denormalized counter on the idea document that tracks this kind
    pub fn counter_field(self) -> &'static str {
        match self {
            EngagementKind::Like => "gazers",
            EngagementKind::Make => "makers",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngagementKind::Like => "like",
            EngagementKind::Make => "make",
        }
    }
}

impl fmt::Display for EngagementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (user, idea, kind) entry of the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngagementRecord {
    /// Id of the ledger write that created this entry
    #[serde(skip)]
    pub entry_id: ObjectId,
    pub user_id: i64,
    #[serde(serialize_with = "bson::serde_helpers::serialize_object_id_as_hex_string")]
    pub idea_id: ObjectId,
    pub kind: EngagementKind,
    /// Seconds since epoch
    pub created_at: i64,
}

/// Progress of a single engagement action.
///
/// `Unengaged -> Engaged` when the ledger accepts the record,
/// `Engaged -> Settled` when the counter moved. A failed counter update
/// compensates back to `Unengaged`; nothing may rest in `Engaged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementState {
    Unengaged,
    Engaged,
    Settled,
}

/// Result of a settled engagement action, returned to the client
#[derive(Debug, Clone, Serialize)]
pub struct EngagementReceipt {
    #[serde(flatten)]
    pub record: EngagementRecord,
    pub state: EngagementState,
}
