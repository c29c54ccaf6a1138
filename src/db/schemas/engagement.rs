//! Engagement ledger document schema
//!
//! The unique index on (user_id, idea_id, kind) is what makes an engagement
//! at-most-once across every running instance.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;
use crate::types::{EngagementKind, EngagementRecord};

/// Collection name for engagements
pub const ENGAGEMENT_COLLECTION: &str = "engagements";

/// Name of the uniqueness constraint backing the ledger
pub const ENGAGEMENT_UNIQUE_INDEX: &str = "user_idea_kind_unique";

/// Engagement document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EngagementDoc {
    /// Generated client-side so a write can be told apart from a
    /// concurrent one for the same triple
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default)]
    pub metadata: Metadata,

    /// Provider user id of the engaging user
    pub user_id: i64,

    pub idea_id: ObjectId,

    pub kind: EngagementKind,
}

impl EngagementDoc {
    pub fn new(user_id: i64, idea_id: ObjectId, kind: EngagementKind) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: Metadata::new(),
            user_id,
            idea_id,
            kind,
        }
    }

    /// Filter matching exactly the ledger write behind `record`
    pub fn entry_filter(record: &EngagementRecord) -> Document {
        doc! {
            "_id": record.entry_id,
            "user_id": record.user_id,
            "idea_id": record.idea_id,
            "kind": record.kind.as_str(),
        }
    }

    /// Filter matching every record of one kind on one idea
    pub fn idea_filter(idea_id: ObjectId, kind: EngagementKind) -> Document {
        doc! { "idea_id": idea_id, "kind": kind.as_str() }
    }
}

impl From<EngagementDoc> for EngagementRecord {
    fn from(doc: EngagementDoc) -> Self {
        let created_at = doc
            .metadata
            .created_at
            .map(|t| t.timestamp_millis() / 1000)
            .unwrap_or_default();

        EngagementRecord {
            entry_id: doc.id,
            user_id: doc.user_id,
            idea_id: doc.idea_id,
            kind: doc.kind,
            created_at,
        }
    }
}

impl IntoIndexes for EngagementDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user_id": 1, "idea_id": 1, "kind": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name(ENGAGEMENT_UNIQUE_INDEX.to_string())
                        .build(),
                ),
            ),
            (
                doc! { "idea_id": 1, "kind": 1 },
                Some(
                    IndexOptions::builder()
                        .name("idea_kind_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_index_covers_the_full_triple() {
        let indices = EngagementDoc::into_indices();
        let (keys, opts) = indices
            .iter()
            .find(|(_, opts)| opts.as_ref().and_then(|o| o.unique) == Some(true))
            .unwrap();
        let fields: Vec<&str> = keys.keys().map(|k| k.as_str()).collect();
        assert_eq!(fields, vec!["user_id", "idea_id", "kind"]);
        assert_eq!(opts.as_ref().and_then(|o| o.unique), Some(true));
    }

    #[test]
    fn test_kind_is_stored_as_lowercase_string() {
        let doc = EngagementDoc::new(7, ObjectId::new(), EngagementKind::Make);
        let stored = bson::to_document(&doc).unwrap();
        assert_eq!(stored.get_str("kind").unwrap(), "make");
    }
}
