//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{DashboardStats, EventRecord, JobRecord, PostRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("data store timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Filter of the public job listing. Part of the cache key of `listJobs`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    /// `Some(true)` keeps remote postings only, `Some(false)` on-site only.
    pub remote: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct CreateEventParams {
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub location: String,
    pub starts_at: OffsetDateTime,
    pub ends_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct UpdateEventParams {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub location: String,
    pub starts_at: OffsetDateTime,
    pub ends_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub published_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: Uuid,
    pub title: String,
    pub excerpt: String,
    pub body_markdown: String,
    pub published_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct CreateJobParams {
    pub slug: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub remote: bool,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct UpdateJobParams {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: String,
    pub remote: bool,
    pub description: String,
    pub open: bool,
}

#[async_trait]
pub trait EventsRepo: Send + Sync {
    /// Events that have not ended at `now`, soonest first.
    async fn list_upcoming(
        &self,
        now: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<EventRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<EventRecord>, RepoError>;

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait EventsWriteRepo: Send + Sync {
    async fn create_event(&self, params: CreateEventParams) -> Result<EventRecord, RepoError>;

    async fn update_event(&self, params: UpdateEventParams) -> Result<EventRecord, RepoError>;

    async fn delete_event(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Published posts, newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<PostRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError>;

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait JobsRepo: Send + Sync {
    /// Open postings matching `filter`, newest first.
    async fn list_open(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<JobRecord>, RepoError>;

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait JobsWriteRepo: Send + Sync {
    async fn create_job(&self, params: CreateJobParams) -> Result<JobRecord, RepoError>;

    async fn update_job(&self, params: UpdateJobParams) -> Result<JobRecord, RepoError>;

    async fn delete_job(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait StatsRepo: Send + Sync {
    async fn dashboard_stats(&self, now: OffsetDateTime) -> Result<DashboardStats, RepoError>;
}
