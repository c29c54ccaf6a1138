//! HTTP server for Sardene

mod http;

pub use http::{route, run, AppState, StorageBackend};
