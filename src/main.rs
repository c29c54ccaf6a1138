//! Sardene - idea board API with GitHub sign-in

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sardene::{
    config::Args,
    db::{MemoryStore, MongoClient, Stores},
    server::{self, AppState, StorageBackend},
    services::{GithubConfig, GithubProvider},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("sardene={},info", log_level).into()),
        )
        .with(args.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.log_json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Sardene API");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode() { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB database: {}", args.mongodb_db);
    info!("GitHub OAuth: {}", args.github_oauth_url);
    info!("GitHub API: {}", args.github_api_url);
    info!(
        "Deadlines: provider {}s, directory {}s, writes {}s",
        args.provider_timeout_secs, args.directory_timeout_secs, args.write_timeout_secs
    );
    info!("======================================");

    // MongoDB is required in production; dev mode falls back to memory
    let (stores, backend) = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            let stores = Stores::mongo(&client).await?;
            info!("MongoDB connected, indexes applied");
            (stores, StorageBackend::Mongo)
        }
        Err(e) => {
            if args.dev_mode() {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                (Stores::memory(Arc::new(MemoryStore::new())), StorageBackend::Memory)
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let provider = Arc::new(GithubProvider::new(GithubConfig::from_args(&args)));
    let state = Arc::new(AppState::new(args, stores, provider, backend));

    server::run(state).await?;

    Ok(())
}
