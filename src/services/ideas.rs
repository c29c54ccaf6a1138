//! Idea catalog: list, publish, edit, delete
//!
//! Plain CRUD over [`IdeaStore`]. Counters are never written here; only
//! [`CounterSync`](crate::services::CounterSync) moves them.

use bson::oid::ObjectId;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::db::schemas::{IdeaChanges, IdeaDoc};
use crate::db::IdeaStore;
use crate::services::with_deadline;
use crate::types::{NotFoundError, Result, ValidationError};

#[derive(Clone)]
pub struct IdeaCatalog {
    ideas: Arc<dyn IdeaStore>,
    read_timeout: Duration,
    write_timeout: Duration,
}

/// Trim a text field, treating blank as absent
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A new idea that passed validation. Both fields are required after trimming.
#[derive(Debug, Clone, PartialEq)]
pub struct IdeaDraft {
    pub name: String,
    pub description: String,
}

impl IdeaDraft {
    pub fn new(
        name: Option<String>,
        description: Option<String>,
    ) -> std::result::Result<Self, ValidationError> {
        let name = non_blank(name)
            .ok_or_else(|| ValidationError::MalformedBody("name is required".into()))?;
        let description = non_blank(description)
            .ok_or_else(|| ValidationError::MalformedBody("description is required".into()))?;
        Ok(Self { name, description })
    }
}

impl IdeaCatalog {
    pub fn new(ideas: Arc<dyn IdeaStore>, read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            ideas,
            read_timeout,
            write_timeout,
        }
    }

    /// All ideas, newest first
    pub async fn list(&self) -> Result<Vec<IdeaDoc>> {
        Ok(with_deadline(self.read_timeout, "idea list", self.ideas.list()).await?)
    }

    /// Store a validated draft with zeroed counters
    pub async fn publish(&self, draft: IdeaDraft, publisher: String) -> Result<IdeaDoc> {
        let idea = IdeaDoc::new(draft.name, draft.description, publisher);
        with_deadline(
            self.write_timeout,
            "idea insert",
            self.ideas.insert(idea.clone()),
        )
        .await?;

        info!(idea_id = %idea.id, publisher = %idea.publisher, "Idea published");
        Ok(idea)
    }

    /// Change name and/or description. Blank fields are left untouched.
    pub async fn update(
        &self,
        id: ObjectId,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<()> {
        let changes = IdeaChanges {
            name: non_blank(name),
            description: non_blank(description),
        };

        if changes.is_empty() {
            return Err(ValidationError::MalformedBody(
                "name or description is required".into(),
            )
            .into());
        }

        let matched = with_deadline(
            self.write_timeout,
            "idea update",
            self.ideas.update_fields(id, changes),
        )
        .await?;

        if !matched {
            return Err(NotFoundError::IdeaMissing.into());
        }
        Ok(())
    }

    pub async fn delete(&self, id: ObjectId) -> Result<()> {
        let deleted = with_deadline(self.write_timeout, "idea delete", self.ideas.delete(id)).await?;

        if !deleted {
            return Err(NotFoundError::IdeaMissing.into());
        }
        info!(idea_id = %id, "Idea deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::types::SardeneError;

    fn catalog() -> IdeaCatalog {
        IdeaCatalog::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(10),
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn test_publish_trims_and_zeroes_counters() {
        let catalog = catalog();
        let draft = IdeaDraft::new(Some("  kettle ".into()), Some("boils water".into())).unwrap();
        let idea = catalog.publish(draft, "alice".into()).await.unwrap();

        assert_eq!(idea.name, "kettle");
        assert_eq!(idea.gazers, 0);
        assert_eq!(idea.makers, 0);
        assert!(idea.created_at > 0);
        assert_eq!(catalog.list().await.unwrap().len(), 1);
    }

    #[test]
    fn test_draft_requires_both_fields() {
        assert!(matches!(
            IdeaDraft::new(Some("kettle".into()), Some("   ".into())),
            Err(ValidationError::MalformedBody(_))
        ));
        assert!(IdeaDraft::new(None, Some("boils".into())).is_err());
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_idea() {
        let catalog = catalog();
        let missing = ObjectId::new();

        let err = catalog
            .update(missing, Some("new".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SardeneError::NotFound(_)));

        let err = catalog.delete(missing).await.unwrap_err();
        assert!(matches!(err, SardeneError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_changes_only_given_field() {
        let catalog = catalog();
        let draft = IdeaDraft::new(Some("kettle".into()), Some("boils".into())).unwrap();
        let idea = catalog.publish(draft, "alice".into()).await.unwrap();

        catalog
            .update(idea.id, None, Some("boils faster".into()))
            .await
            .unwrap();

        let ideas = catalog.list().await.unwrap();
        assert_eq!(ideas[0].name, "kettle");
        assert_eq!(ideas[0].description, "boils faster");

        let err = catalog.update(idea.id, Some(" ".into()), None).await.unwrap_err();
        assert!(matches!(err, SardeneError::Validation(_)));
    }
}
