//! Welcome, liveness, and version endpoints
//!
//! - `GET /` plain-text welcome
//! - `GET /ping` liveness probe
//! - `GET /version` build info for deployment checks

use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::routes::{json_response, text_response, BoxBody};
use crate::server::AppState;

const WELCOME: &str = "Welcome to Sardene API, \nServer running successfully\n\
Visit https://github.com/M-ZubairAhmed/Sardene-API for documentation.";

#[derive(Serialize)]
pub struct PingResponse {
    pub status: u16,
    pub message: &'static str,
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub commit: &'static str,
    pub build_time: &'static str,
    pub service: &'static str,
    pub node_id: String,
    /// Backing store in use: "mongodb" or "memory"
    pub storage: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
}

pub fn welcome(state: &AppState) -> Response<BoxBody> {
    text_response(state.origin(), StatusCode::OK, WELCOME)
}

pub fn ping(state: &AppState) -> Response<BoxBody> {
    json_response(
        state.origin(),
        StatusCode::OK,
        &PingResponse {
            status: StatusCode::OK.as_u16(),
            message: "pinged success",
        },
    )
}

pub fn version_info(state: &AppState) -> Response<BoxBody> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "sardene-api",
        node_id: state.args.node_id.to_string(),
        storage: state.storage_backend.as_str(),
        uptime: state.started_at.elapsed().as_secs(),
    };

    json_response(state.origin(), StatusCode::OK, &response)
}
