mod cache;
mod content;
mod dashboard;
mod state;

pub use state::AdminState;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use super::middleware::{Surface, log_responses, set_request_context};

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/stats", get(dashboard::admin_stats))
        .route("/admin/events", post(content::create_event))
        .route(
            "/admin/events/{id}",
            put(content::update_event).delete(content::delete_event),
        )
        .route("/admin/posts", post(content::create_post))
        .route(
            "/admin/posts/{id}",
            put(content::update_post).delete(content::delete_post),
        )
        .route("/admin/jobs", post(content::create_job))
        .route(
            "/admin/jobs/{id}",
            put(content::update_job).delete(content::delete_job),
        )
        .route("/admin/cache", get(cache::cache_overview))
        .route("/admin/cache/invalidate", post(cache::invalidate_tags))
        .route("/admin/cache/purge", post(cache::purge_cache))
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            Surface::Admin,
            log_responses,
        ))
        .layer(middleware::from_fn(set_request_context))
}
