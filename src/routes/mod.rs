//! HTTP route handlers
//!
//! - `health`: welcome text, ping, version
//! - `auth_routes`: OAuth code exchange
//! - `ideas`: idea catalog and engagement endpoints
//!
//! Handlers are generic over the request body so they can be driven with
//! in-memory bodies as well as `hyper::body::Incoming`.

pub mod auth_routes;
pub mod health;
pub mod ideas;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use tracing::{debug, warn};

use crate::types::{SardeneError, ValidationError};

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Largest JSON body accepted
const MAX_BODY_BYTES: usize = 10 * 1024;

const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Success envelope: `{"status", "data", ["count"], ["message"]}`
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: u16,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(status: StatusCode, data: T) -> Self {
        Self {
            status: status.as_u16(),
            data,
            count: None,
            message: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Failure envelope: `{"status", "error", "code"}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub error: String,
    pub code: &'static str,
}

pub fn json_response<T: Serialize>(origin: &str, status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    with_cors(Response::builder().status(status), origin)
        .header("Content-Type", "application/json")
        .body(full_body(json))
        .unwrap_or_else(|_| Response::new(empty_body()))
}

pub fn envelope_response<T: Serialize>(
    origin: &str,
    status: StatusCode,
    envelope: Envelope<T>,
) -> Response<BoxBody> {
    json_response(origin, status, &envelope)
}

pub fn text_response(origin: &str, status: StatusCode, text: &'static str) -> Response<BoxBody> {
    with_cors(Response::builder().status(status), origin)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(full_body(text))
        .unwrap_or_else(|_| Response::new(empty_body()))
}

/// Render an error for the client. Internal detail goes to the log only.
pub fn error_response(origin: &str, err: &SardeneError) -> Response<BoxBody> {
    let status = err.status_code();

    if status.is_server_error() || status == StatusCode::FORBIDDEN {
        warn!(code = err.code(), error = %err, "Request failed");
    } else {
        debug!(code = err.code(), error = %err, "Request rejected");
    }

    json_response(
        origin,
        status,
        &ErrorResponse {
            status: status.as_u16(),
            error: err.public_message(),
            code: err.code(),
        },
    )
}

pub fn not_found(origin: &str) -> Response<BoxBody> {
    json_response(
        origin,
        StatusCode::NOT_FOUND,
        &ErrorResponse {
            status: StatusCode::NOT_FOUND.as_u16(),
            error: "Route not found".to_string(),
            code: "ROUTE_NOT_FOUND",
        },
    )
}

pub fn cors_preflight(origin: &str) -> Response<BoxBody> {
    with_cors(Response::builder().status(StatusCode::NO_CONTENT), origin)
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap_or_else(|_| Response::new(empty_body()))
}

fn with_cors(builder: hyper::http::response::Builder, origin: &str) -> hyper::http::response::Builder {
    builder
        .header("Access-Control-Allow-Origin", origin)
        .header("Access-Control-Allow-Methods", ALLOW_METHODS)
        .header("Access-Control-Allow-Headers", ALLOW_HEADERS)
        .header("Vary", "Origin")
}

pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

/// Read and decode a JSON body of at most 10KB
pub async fn parse_json_body<B, T>(req: Request<B>) -> Result<T, SardeneError>
where
    B: Body,
    B::Error: Display,
    T: DeserializeOwned,
{
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| ValidationError::MalformedBody(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > MAX_BODY_BYTES {
        return Err(ValidationError::MalformedBody("Request body too large".into()).into());
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| ValidationError::MalformedBody(format!("Invalid JSON: {}", e)).into())
}

pub fn auth_header<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConflictError;

    async fn body_json(response: Response<BoxBody>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_response_uses_public_envelope() {
        let err: SardeneError = ConflictError::AlreadyEngaged.into();
        let response = error_response("https://sardene.cf", &err);

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            response.headers()["Access-Control-Allow-Origin"],
            "https://sardene.cf"
        );

        let json = body_json(response).await;
        assert_eq!(json["status"], 409);
        assert_eq!(json["code"], "ALREADY_ENGAGED");
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn test_envelope_skips_absent_count() {
        let response = envelope_response(
            "*",
            StatusCode::OK,
            Envelope::new(StatusCode::OK, vec![1, 2]).with_count(2),
        );
        let json = body_json(response).await;
        assert_eq!(json["count"], 2);
        assert!(json.get("message").is_none());
    }

    #[tokio::test]
    async fn test_oversized_body_is_malformed() {
        let big = format!("{{\"code\":\"{}\"}}", "x".repeat(MAX_BODY_BYTES));
        let req = Request::new(Full::new(Bytes::from(big)));

        let result: Result<serde_json::Value, _> = parse_json_body(req).await;
        assert!(matches!(
            result,
            Err(SardeneError::Validation(ValidationError::MalformedBody(_)))
        ));
    }
}
