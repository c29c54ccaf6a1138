//! Idea routes
//!
//! Catalog:
//! - `GET /ideas`
//! - `POST /idea/add`
//! - `PUT /idea/update/:id`
//! - `DELETE /idea/delete/:id`
//!
//! Engagement (bearer required):
//! - `PATCH /idea/gaze/:id`, `PATCH /idea/make/:id`
//! - `GET /ideas/gazed`, `GET /ideas/made`

use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::db::schemas::IdeaDoc;
use crate::routes::{
    auth_header, envelope_response, error_response, parse_json_body, BoxBody, Envelope,
};
use crate::server::AppState;
use crate::services::{parse_idea_id, IdeaDraft};
use crate::types::{EngagementKind, SardeneError};

/// Idea as clients see it: `_id` is the hex string
#[derive(Debug, Serialize)]
pub struct IdeaView {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub publisher: String,
    pub makers: i64,
    pub gazers: i64,
    pub created_at: i64,
}

impl From<IdeaDoc> for IdeaView {
    fn from(doc: IdeaDoc) -> Self {
        Self {
            id: doc.id.to_hex(),
            name: doc.name,
            description: doc.description,
            publisher: doc.publisher,
            makers: doc.makers,
            gazers: doc.gazers,
            created_at: doc.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IdeaBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn list_ideas(state: &AppState) -> Response<BoxBody> {
    let origin = state.origin();

    match state.catalog.list().await {
        Ok(ideas) => {
            let views: Vec<IdeaView> = ideas.into_iter().map(IdeaView::from).collect();
            let count = views.len();
            envelope_response(
                origin,
                StatusCode::OK,
                Envelope::new(StatusCode::OK, views).with_count(count),
            )
        }
        Err(e) => error_response(origin, &e),
    }
}

pub async fn add_idea<B>(state: &AppState, req: Request<B>) -> Response<BoxBody>
where
    B: Body,
    B::Error: Display,
{
    let origin = state.origin();
    let header = auth_header(&req).map(str::to_owned);

    let draft = match parse_json_body::<_, IdeaBody>(req)
        .await
        .and_then(|body| IdeaDraft::new(body.name, body.description).map_err(SardeneError::from))
    {
        Ok(draft) => draft,
        Err(e) => return error_response(origin, &e),
    };

    let publisher = state.gateway.publisher_for(header.as_deref()).await;

    match state.catalog.publish(draft, publisher).await {
        Ok(idea) => envelope_response(
            origin,
            StatusCode::CREATED,
            Envelope::new(StatusCode::CREATED, IdeaView::from(idea))
                .with_message("Idea added successfully"),
        ),
        Err(e) => error_response(origin, &e),
    }
}

pub async fn update_idea<B>(state: &AppState, req: Request<B>, raw_id: &str) -> Response<BoxBody>
where
    B: Body,
    B::Error: Display,
{
    let origin = state.origin();

    let id = match parse_idea_id(raw_id) {
        Ok(id) => id,
        Err(e) => return error_response(origin, &SardeneError::from(e)),
    };

    let body: IdeaBody = match parse_json_body(req).await {
        Ok(body) => body,
        Err(e) => return error_response(origin, &e),
    };

    match state.catalog.update(id, body.name, body.description).await {
        Ok(()) => envelope_response(
            origin,
            StatusCode::OK,
            Envelope::new(StatusCode::OK, "").with_message("Updated idea successfully"),
        ),
        Err(e) => error_response(origin, &e),
    }
}

pub async fn delete_idea(state: &AppState, raw_id: &str) -> Response<BoxBody> {
    let origin = state.origin();

    let id = match parse_idea_id(raw_id) {
        Ok(id) => id,
        Err(e) => return error_response(origin, &SardeneError::from(e)),
    };

    match state.catalog.delete(id).await {
        Ok(()) => envelope_response(
            origin,
            StatusCode::OK,
            Envelope::new(StatusCode::OK, "").with_message("Idea deleted successfully"),
        ),
        Err(e) => error_response(origin, &e),
    }
}

/// `PATCH /idea/gaze/:id` and `PATCH /idea/make/:id`
pub async fn engage(
    state: &AppState,
    header: Option<&str>,
    raw_id: &str,
    kind: EngagementKind,
) -> Response<BoxBody> {
    let origin = state.origin();

    match state.gateway.engage(header, raw_id, kind).await {
        Ok(receipt) => {
            let message = match kind {
                EngagementKind::Like => "Gazed idea successfully",
                EngagementKind::Make => "Making idea recorded",
            };
            envelope_response(
                origin,
                StatusCode::OK,
                Envelope::new(StatusCode::OK, receipt).with_message(message),
            )
        }
        Err(e) => error_response(origin, &e),
    }
}

/// `GET /ideas/gazed` and `GET /ideas/made`
pub async fn list_engaged(
    state: &AppState,
    header: Option<&str>,
    kind: EngagementKind,
) -> Response<BoxBody> {
    let origin = state.origin();

    match state.gateway.engagements_of(header, kind).await {
        Ok(records) => {
            let count = records.len();
            envelope_response(
                origin,
                StatusCode::OK,
                Envelope::new(StatusCode::OK, records).with_count(count),
            )
        }
        Err(e) => error_response(origin, &e),
    }
}
