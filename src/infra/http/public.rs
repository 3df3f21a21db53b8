use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use crate::application::{error::AppError, listings::ListingService, repos::JobFilter};

use super::{
    json_response,
    middleware::{Surface, log_responses, set_request_context},
};

const DEFAULT_LISTING_LIMIT: usize = 20;
const MAX_LISTING_LIMIT: usize = 100;

#[derive(Clone)]
pub struct HttpState {
    pub listings: Arc<ListingService>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/{slug}", get(event_detail))
        .route("/posts", get(list_posts))
        .route("/posts/{slug}", get(post_detail))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{slug}", get(job_detail))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            Surface::Public,
            log_responses,
        ))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LimitQuery {
    limit: Option<usize>,
}

impl LimitQuery {
    /// Requested page size, clamped to `1..=MAX_LISTING_LIMIT`.
    fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_LISTING_LIMIT)
            .clamp(1, MAX_LISTING_LIMIT)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobsQuery {
    remote: Option<bool>,
}

async fn list_events(State(state): State<HttpState>, Query(query): Query<LimitQuery>) -> Response {
    match state.listings.upcoming_events(query.limit()).await {
        Ok(events) => json_response(StatusCode::OK, events.as_slice()),
        Err(err) => err.into_response(),
    }
}

async fn event_detail(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    match state.listings.event(&slug).await {
        Ok(event) => match event.as_ref() {
            Some(event) => json_response(StatusCode::OK, event),
            None => AppError::NotFound.into_response(),
        },
        Err(err) => err.into_response(),
    }
}

async fn list_posts(State(state): State<HttpState>, Query(query): Query<LimitQuery>) -> Response {
    match state.listings.recent_posts(query.limit()).await {
        Ok(posts) => json_response(StatusCode::OK, posts.as_slice()),
        Err(err) => err.into_response(),
    }
}

async fn post_detail(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    match state.listings.post(&slug).await {
        Ok(post) => match post.as_ref() {
            Some(post) => json_response(StatusCode::OK, post),
            None => AppError::NotFound.into_response(),
        },
        Err(err) => err.into_response(),
    }
}

async fn list_jobs(State(state): State<HttpState>, Query(query): Query<JobsQuery>) -> Response {
    let filter = JobFilter {
        remote: query.remote,
    };
    match state.listings.open_jobs(filter).await {
        Ok(jobs) => json_response(StatusCode::OK, jobs.as_slice()),
        Err(err) => err.into_response(),
    }
}

async fn job_detail(State(state): State<HttpState>, Path(slug): Path<String>) -> Response {
    match state.listings.job(&slug).await {
        Ok(job) => match job.as_ref() {
            Some(job) => json_response(StatusCode::OK, job),
            None => AppError::NotFound.into_response(),
        },
        Err(err) => err.into_response(),
    }
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
