//! Authentication routes
//!
//! `POST /auth` exchanges a GitHub OAuth code for the caller's identity and
//! the provider access token. The token is the bearer credential for every
//! later call; no local session is created.

use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use std::fmt::Display;

use crate::routes::{envelope_response, error_response, parse_json_body, BoxBody, Envelope};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub code: String,
}

pub async fn handle_auth<B>(state: &AppState, req: Request<B>) -> Response<BoxBody>
where
    B: Body,
    B::Error: Display,
{
    let origin = state.origin();

    let body: AuthRequest = match parse_json_body(req).await {
        Ok(body) => body,
        Err(e) => return error_response(origin, &e),
    };

    match state.gateway.login(&body.code).await {
        Ok(grant) => envelope_response(origin, StatusCode::OK, Envelope::new(StatusCode::OK, grant)),
        Err(e) => error_response(origin, &e),
    }
}
