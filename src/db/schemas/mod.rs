//! Database schemas for Sardene
//!
//! Defines MongoDB document structures for ideas, users, and engagements.

mod engagement;
mod idea;
mod metadata;
mod user;

pub use engagement::{EngagementDoc, ENGAGEMENT_COLLECTION, ENGAGEMENT_UNIQUE_INDEX};
pub use idea::{IdeaChanges, IdeaDoc, ANONYMOUS_PUBLISHER, IDEA_COLLECTION};
pub use metadata::Metadata;
pub use user::{UserDoc, USER_COLLECTION};
