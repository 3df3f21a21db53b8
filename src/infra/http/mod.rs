mod admin;
mod middleware;
mod public;

pub use admin::{AdminState, build_admin_router};
pub use middleware::RequestContext;
pub use public::{HttpState, build_router};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Serialize `value` as a JSON response with `status`.
fn json_response<T>(status: StatusCode, value: &T) -> Response
where
    T: Serialize + ?Sized,
{
    (status, Json(value)).into_response()
}
