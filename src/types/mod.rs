//! Shared types for Sardene

pub mod engagement;
pub mod error;
pub mod identity;

pub use engagement::{EngagementKind, EngagementReceipt, EngagementRecord, EngagementState};
pub use error::{
    AuthError, ConflictError, NotFoundError, Result, SardeneError, StorageError, ValidationError,
};
pub use identity::{BearerCredential, Identity};
