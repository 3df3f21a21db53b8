#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use corkboard::{
    application::{admin::AdminService, listings::ListingService},
    cache::{CacheConfig, CacheTrigger, TagCache},
    config::RevalidateSettings,
    infra::{
        http::{AdminState, HttpState, build_admin_router, build_router},
        memory::MemoryRepositories,
    },
};
use serde_json::Value;
use tower::ServiceExt;

pub struct TestBoard {
    pub cache: Arc<TagCache>,
    pub public: Router,
    pub admin: Router,
}

pub fn board() -> TestBoard {
    board_with(CacheConfig::default())
}

pub fn board_with(config: CacheConfig) -> TestBoard {
    let repos = Arc::new(MemoryRepositories::new());
    let cache = Arc::new(TagCache::new(config));

    let listings = Arc::new(ListingService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        cache.clone(),
        RevalidateSettings::default(),
    ));
    let admin = Arc::new(AdminService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos,
        CacheTrigger::new(cache.clone()),
    ));

    TestBoard {
        public: build_router(HttpState {
            listings: listings.clone(),
        }),
        admin: build_admin_router(AdminState {
            admin,
            listings,
            cache: cache.clone(),
        }),
        cache,
    }
}

pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Method::GET, uri, None).await
}

pub async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(router, Method::POST, uri, Some(body)).await
}
