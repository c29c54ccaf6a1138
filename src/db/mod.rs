//! Database layer for Sardene
//!
//! MongoDB storage for ideas, the user directory, and the engagement ledger,
//! behind the traits in [`store`].

pub mod memory;
pub mod mongo;
pub mod mongo_store;
pub mod schemas;
pub mod store;

pub use memory::MemoryStore;
pub use mongo::{MongoClient, MongoCollection};
pub use store::{EngagementStore, IdeaStore, InsertOutcome, Stores, UserStore};
