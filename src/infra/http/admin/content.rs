use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::application::admin::{EventCommand, JobCommand, PostCommand};

use super::super::json_response;
use super::AdminState;

pub(super) async fn create_event(
    State(state): State<AdminState>,
    Json(command): Json<EventCommand>,
) -> Response {
    match state.admin.create_event(command).await {
        Ok(event) => json_response(StatusCode::CREATED, &event),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn update_event(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(command): Json<EventCommand>,
) -> Response {
    match state.admin.update_event(id, command).await {
        Ok(event) => json_response(StatusCode::OK, &event),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn delete_event(State(state): State<AdminState>, Path(id): Path<Uuid>) -> Response {
    match state.admin.delete_event(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn create_post(
    State(state): State<AdminState>,
    Json(command): Json<PostCommand>,
) -> Response {
    match state.admin.create_post(command).await {
        Ok(post) => json_response(StatusCode::CREATED, &post),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn update_post(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(command): Json<PostCommand>,
) -> Response {
    match state.admin.update_post(id, command).await {
        Ok(post) => json_response(StatusCode::OK, &post),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn delete_post(State(state): State<AdminState>, Path(id): Path<Uuid>) -> Response {
    match state.admin.delete_post(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn create_job(
    State(state): State<AdminState>,
    Json(command): Json<JobCommand>,
) -> Response {
    match state.admin.create_job(command).await {
        Ok(job) => json_response(StatusCode::CREATED, &job),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn update_job(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(command): Json<JobCommand>,
) -> Response {
    match state.admin.update_job(id, command).await {
        Ok(job) => json_response(StatusCode::OK, &job),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn delete_job(State(state): State<AdminState>, Path(id): Path<Uuid>) -> Response {
    match state.admin.delete_job(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}
