use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::super::json_response;
use super::AdminState;

pub(super) async fn admin_stats(State(state): State<AdminState>) -> Response {
    match state.listings.dashboard_stats().await {
        Ok(stats) => json_response(StatusCode::OK, stats.as_ref()),
        Err(err) => err.into_response(),
    }
}
