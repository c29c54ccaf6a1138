//! Idea document schema
//!
//! Keeps the field layout of the existing `ideas` collection so documents
//! written before this service remain readable.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::types::EngagementKind;

/// Collection name for ideas
pub const IDEA_COLLECTION: &str = "ideas";

/// Publisher recorded when an idea is added without a signed-in user
pub const ANONYMOUS_PUBLISHER: &str = "Unnamed contact";

/// Idea document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IdeaDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub name: String,

    pub description: String,

    /// Login of the publishing user
    pub publisher: String,

    /// Users who are building this idea
    #[serde(default)]
    pub makers: i64,

    /// Users who like this idea
    #[serde(default)]
    pub gazers: i64,

    /// Seconds since epoch
    pub created_at: i64,
}

impl IdeaDoc {
    /// Create a fresh idea with zeroed counters
    pub fn new(name: String, description: String, publisher: String) -> Self {
        Self {
            id: ObjectId::new(),
            name,
            description,
            publisher,
            makers: 0,
            gazers: 0,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn counter(&self, kind: EngagementKind) -> i64 {
        match kind {
            EngagementKind::Like => self.gazers,
            EngagementKind::Make => self.makers,
        }
    }
}

/// Partial update of an idea's text fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdeaChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl IdeaChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }

    /// `$set` body for the changed fields
    pub fn to_set_document(&self) -> Document {
        let mut set = Document::new();
        if let Some(name) = &self.name {
            set.insert("name", name);
        }
        if let Some(description) = &self.description {
            set.insert("description", description);
        }
        set
    }
}

impl IntoIndexes for IdeaDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "created_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("created_at_index".to_string())
                    .build(),
            ),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changes_set_document_only_carries_present_fields() {
        let changes = IdeaChanges {
            name: None,
            description: Some("solar kettle".into()),
        };
        let set = changes.to_set_document();
        assert_eq!(set.get_str("description").unwrap(), "solar kettle");
        assert!(!set.contains_key("name"));
        assert!(IdeaChanges::default().is_empty());
    }

    #[test]
    fn test_idea_doc_reads_legacy_document() {
        let id = ObjectId::new();
        let legacy = doc! {
            "_id": id,
            "name": "kettle",
            "description": "boils",
            "publisher": "Unnamed contact",
            "makers": 2_i64,
            "gazers": 5_i64,
            "created_at": 1_560_000_000_i64,
        };

        let idea: IdeaDoc = bson::from_document(legacy).unwrap();
        assert_eq!(idea.id, id);
        assert_eq!(idea.counter(EngagementKind::Like), 5);
        assert_eq!(idea.counter(EngagementKind::Make), 2);
    }
}
