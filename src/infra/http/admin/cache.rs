use std::collections::BTreeMap;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::application::error::AppError;
use crate::cache::Tag;
use crate::domain::tags;

use super::super::json_response;
use super::AdminState;

#[derive(Debug, Serialize)]
struct CacheOverview {
    enabled: bool,
    entries: usize,
    /// Entries per application tag.
    tags: BTreeMap<Tag, usize>,
}

#[derive(Debug, Deserialize)]
pub(super) struct InvalidateRequest {
    tags: Vec<Tag>,
}

pub(super) async fn cache_overview(State(state): State<AdminState>) -> Response {
    let overview = CacheOverview {
        enabled: state.cache.config().enabled,
        entries: state.cache.len(),
        tags: tags::ALL
            .into_iter()
            .map(|tag| {
                let count = state.cache.entries_tagged(&tag);
                (tag, count)
            })
            .collect(),
    };
    json_response(StatusCode::OK, &overview)
}

pub(super) async fn invalidate_tags(
    State(state): State<AdminState>,
    Json(request): Json<InvalidateRequest>,
) -> Response {
    if request.tags.iter().any(|tag| tag.as_str().trim().is_empty()) {
        return AppError::validation("tags must not be blank").into_response();
    }
    let report = state.admin.trigger().invalidate(request.tags);
    json_response(StatusCode::OK, &report)
}

pub(super) async fn purge_cache(State(state): State<AdminState>) -> Response {
    let report = state.admin.trigger().purge_all();
    json_response(StatusCode::OK, &report)
}
