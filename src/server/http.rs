//! HTTP server implementation
//!
//! hyper http1 with TokioIo; one task per connection, one request at a time
//! per connection.

use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::db::Stores;
use crate::routes::{self, auth_header, BoxBody};
use crate::services::{AuthGateway, IdeaCatalog, IdentityProvider};
use crate::types::{EngagementKind, SardeneError};

/// Which store implementation the instance runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageBackend::Mongo => "mongodb",
            StorageBackend::Memory => "memory",
        }
    }
}

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub catalog: IdeaCatalog,
    pub gateway: AuthGateway,
    pub storage_backend: StorageBackend,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        args: Args,
        stores: Stores,
        provider: Arc<dyn IdentityProvider>,
        storage_backend: StorageBackend,
    ) -> Self {
        let read_timeout = args.directory_timeout();
        let write_timeout = args.write_timeout();

        Self {
            catalog: IdeaCatalog::new(stores.ideas.clone(), read_timeout, write_timeout),
            gateway: AuthGateway::from_stores(&stores, provider, read_timeout, write_timeout),
            args,
            storage_backend,
            started_at: Instant::now(),
        }
    }

    /// Origin echoed in CORS headers
    pub fn origin(&self) -> &str {
        self.args.allowed_origin()
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), SardeneError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Sardene listening on {} as node {}",
        state.args.listen, state.args.node_id
    );
    info!("CORS origin: {}", state.origin());

    if state.storage_backend == StorageBackend::Memory {
        warn!("Running on the in-memory store - data is lost on restart");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    info!("[{}] {} {}", addr, req.method(), req.uri().path());
    Ok(route(&state, req).await)
}

/// Dispatch one request to its handler
pub async fn route<B>(state: &AppState, req: Request<B>) -> Response<BoxBody>
where
    B: Body,
    B::Error: Display,
{
    let origin = state.origin();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let header = auth_header(&req).map(str::to_owned);

    if method == Method::OPTIONS {
        return routes::cors_preflight(origin);
    }

    match (method, path.as_str()) {
        (Method::GET, "/") => routes::health::welcome(state),
        (Method::GET, "/ping") => routes::health::ping(state),
        (Method::GET, "/version") => routes::health::version_info(state),

        (Method::POST, "/auth") => routes::auth_routes::handle_auth(state, req).await,

        (Method::GET, "/ideas") => routes::ideas::list_ideas(state).await,
        (Method::GET, "/ideas/gazed") => {
            routes::ideas::list_engaged(state, header.as_deref(), EngagementKind::Like).await
        }
        (Method::GET, "/ideas/made") => {
            routes::ideas::list_engaged(state, header.as_deref(), EngagementKind::Make).await
        }
        (Method::POST, "/idea/add") => routes::ideas::add_idea(state, req).await,

        (Method::PATCH, p) if p.starts_with("/idea/gaze/") => {
            let raw_id = &p["/idea/gaze/".len()..];
            routes::ideas::engage(state, header.as_deref(), raw_id, EngagementKind::Like).await
        }
        (Method::PATCH, p) if p.starts_with("/idea/make/") => {
            let raw_id = &p["/idea/make/".len()..];
            routes::ideas::engage(state, header.as_deref(), raw_id, EngagementKind::Make).await
        }
        (Method::PUT, p) if p.starts_with("/idea/update/") => {
            let raw_id = &p["/idea/update/".len()..];
            routes::ideas::update_idea(state, req, raw_id).await
        }
        (Method::DELETE, p) if p.starts_with("/idea/delete/") => {
            let raw_id = &p["/idea/delete/".len()..];
            routes::ideas::delete_idea(state, raw_id).await
        }

        _ => routes::not_found(origin),
    }
}
