//! Sardene - idea board API with GitHub sign-in
//!
//! Users publish ideas, gaze at them (like), and mark them as being made.
//! Sign-in exchanges a GitHub OAuth code for the user's identity; the
//! GitHub access token is then the bearer credential on later calls.
//!
//! ## Services
//!
//! - **Identity**: OAuth code exchange and bearer resolution against GitHub
//! - **Directory**: first-write-wins provisioning of signed-in users
//! - **Ledger**: at-most-once engagement records behind a unique index
//! - **Counters**: the idea's `gazers`/`makers` kept in step with the ledger
//! - **Catalog**: plain idea CRUD

pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, SardeneError};
