//! Configuration for Sardene
//!
//! CLI arguments and environment variable handling using clap.
//! Variable names match the existing deployment environment
//! (`GITHUB_CLIENT`, `GITHUB_SECRET`, `ENVIRONMENT`).

use clap::Parser;
use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Production CORS origin
pub const PRODUCTION_ORIGIN: &str = "https://sardene.cf";

/// CORS origin used when ENVIRONMENT=dev
pub const DEV_ORIGIN: &str = "http://localhost:3000";

/// A configuration value that must never reach the logs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl FromStr for Secret {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

/// Sardene API - publish ideas, gaze at them, make them
#[derive(Parser, Debug, Clone)]
#[command(name = "sardene")]
#[command(about = "Idea board API with GitHub sign-in")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Deployment environment ("dev" enables development mode)
    #[arg(long, env = "ENVIRONMENT", default_value = "production")]
    pub environment: String,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "sardene-db")]
    pub mongodb_db: String,

    /// GitHub OAuth application client id
    #[arg(long, env = "GITHUB_CLIENT")]
    pub github_client_id: Option<String>,

    /// GitHub OAuth application client secret
    #[arg(long, env = "GITHUB_SECRET")]
    pub github_client_secret: Option<Secret>,

    /// Base URL of the OAuth token endpoint host
    #[arg(long, env = "GITHUB_OAUTH_URL", default_value = "https://github.com")]
    pub github_oauth_url: String,

    /// Base URL of the GitHub REST API
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub github_api_url: String,

    /// CORS origin override (defaults depend on ENVIRONMENT)
    #[arg(long, env = "ALLOWED_ORIGIN")]
    pub allowed_origin: Option<String>,

    /// Deadline for each identity provider round trip
    #[arg(long, env = "PROVIDER_TIMEOUT_SECS", default_value = "5")]
    pub provider_timeout_secs: u64,

    /// Deadline for user directory reads
    #[arg(long, env = "DIRECTORY_TIMEOUT_SECS", default_value = "10")]
    pub directory_timeout_secs: u64,

    /// Deadline for ledger and idea writes
    #[arg(long, env = "WRITE_TIMEOUT_SECS", default_value = "30")]
    pub write_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Args {
    pub fn dev_mode(&self) -> bool {
        self.environment.eq_ignore_ascii_case("dev")
    }

    /// Origin allowed by CORS responses
    pub fn allowed_origin(&self) -> &str {
        match &self.allowed_origin {
            Some(origin) => origin,
            None if self.dev_mode() => DEV_ORIGIN,
            None => PRODUCTION_ORIGIN,
        }
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn directory_timeout(&self) -> Duration {
        Duration::from_secs(self.directory_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode() {
            if self.github_client_id.as_deref().unwrap_or("").is_empty() {
                return Err("GITHUB_CLIENT is required in production mode".to_string());
            }
            if self.github_client_secret.as_ref().map_or(true, |s| s.expose().is_empty()) {
                return Err("GITHUB_SECRET is required in production mode".to_string());
            }
        }

        if self.provider_timeout_secs == 0
            || self.directory_timeout_secs == 0
            || self.write_timeout_secs == 0
        {
            return Err("Timeouts must be at least one second".to_string());
        }

        Ok(())
    }
}
