//! In-process repository implementations.
//!
//! Stands in for the relational store: every trait of
//! `application::repos` is implemented over maps guarded by `RwLock`s.
//! Nothing is persisted across restarts.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::repos::{
    CreateEventParams, CreateJobParams, CreatePostParams, EventsRepo, EventsWriteRepo, JobFilter,
    JobsRepo, JobsWriteRepo, PostsRepo, PostsWriteRepo, RepoError, StatsRepo, UpdateEventParams,
    UpdateJobParams, UpdatePostParams,
};
use crate::domain::entities::{DashboardStats, EventRecord, JobRecord, PostRecord};

type Table<T> = RwLock<HashMap<Uuid, T>>;

#[derive(Default)]
struct Tables {
    events: Table<EventRecord>,
    posts: Table<PostRecord>,
    jobs: Table<JobRecord>,
}

#[derive(Clone, Default)]
pub struct MemoryRepositories {
    tables: Arc<Tables>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<'a, T>(table: &'a Table<T>, op: &'static str) -> RwLockReadGuard<'a, HashMap<Uuid, T>> {
    table.read().unwrap_or_else(|poisoned| {
        warn!(
            op,
            lock_kind = "rwlock.read",
            result = "poisoned_recovered",
            "Recovered from poisoned repository lock"
        );
        poisoned.into_inner()
    })
}

fn write<'a, T>(table: &'a Table<T>, op: &'static str) -> RwLockWriteGuard<'a, HashMap<Uuid, T>> {
    table.write().unwrap_or_else(|poisoned| {
        warn!(
            op,
            lock_kind = "rwlock.write",
            result = "poisoned_recovered",
            "Recovered from poisoned repository lock"
        );
        poisoned.into_inner()
    })
}

fn duplicate_slug(constraint: &str) -> RepoError {
    RepoError::Duplicate {
        constraint: constraint.to_string(),
    }
}

#[async_trait]
impl EventsRepo for MemoryRepositories {
    async fn list_upcoming(
        &self,
        now: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<EventRecord>, RepoError> {
        let events = read(&self.tables.events, "events.list_upcoming");
        let mut upcoming: Vec<EventRecord> = events
            .values()
            .filter(|event| event.is_upcoming(now))
            .cloned()
            .collect();
        upcoming.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then_with(|| a.slug.cmp(&b.slug)));
        upcoming.truncate(limit);
        Ok(upcoming)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<EventRecord>, RepoError> {
        let events = read(&self.tables.events, "events.find_by_slug");
        Ok(events.values().find(|event| event.slug == slug).cloned())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError> {
        let events = read(&self.tables.events, "events.slug_exists");
        Ok(events.values().any(|event| event.slug == slug))
    }
}

#[async_trait]
impl EventsWriteRepo for MemoryRepositories {
    async fn create_event(&self, params: CreateEventParams) -> Result<EventRecord, RepoError> {
        let mut events = write(&self.tables.events, "events.create");
        if events.values().any(|event| event.slug == params.slug) {
            return Err(duplicate_slug("events_slug_key"));
        }

        let now = OffsetDateTime::now_utc();
        let record = EventRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            title: params.title,
            summary: params.summary,
            location: params.location,
            starts_at: params.starts_at,
            ends_at: params.ends_at,
            created_at: now,
            updated_at: now,
        };
        events.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_event(&self, params: UpdateEventParams) -> Result<EventRecord, RepoError> {
        let mut events = write(&self.tables.events, "events.update");
        let record = events.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        record.title = params.title;
        record.summary = params.summary;
        record.location = params.location;
        record.starts_at = params.starts_at;
        record.ends_at = params.ends_at;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn delete_event(&self, id: Uuid) -> Result<(), RepoError> {
        let mut events = write(&self.tables.events, "events.delete");
        events.remove(&id).map(|_| ()).ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl PostsRepo for MemoryRepositories {
    async fn list_recent(&self, limit: usize) -> Result<Vec<PostRecord>, RepoError> {
        let posts = read(&self.tables.posts, "posts.list_recent");
        let mut published: Vec<PostRecord> = posts
            .values()
            .filter(|post| post.is_published())
            .cloned()
            .collect();
        published.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.slug.cmp(&b.slug))
        });
        published.truncate(limit);
        Ok(published)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        let posts = read(&self.tables.posts, "posts.find_by_slug");
        Ok(posts.values().find(|post| post.slug == slug).cloned())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError> {
        let posts = read(&self.tables.posts, "posts.slug_exists");
        Ok(posts.values().any(|post| post.slug == slug))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut posts = write(&self.tables.posts, "posts.create");
        if posts.values().any(|post| post.slug == params.slug) {
            return Err(duplicate_slug("posts_slug_key"));
        }

        let now = OffsetDateTime::now_utc();
        let record = PostRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            title: params.title,
            excerpt: params.excerpt,
            body_markdown: params.body_markdown,
            published_at: params.published_at,
            created_at: now,
            updated_at: now,
        };
        posts.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut posts = write(&self.tables.posts, "posts.update");
        let record = posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        record.title = params.title;
        record.excerpt = params.excerpt;
        record.body_markdown = params.body_markdown;
        // Keep the original publication time when re-publishing.
        record.published_at = match params.published_at {
            Some(at) => Some(record.published_at.unwrap_or(at)),
            None => None,
        };
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let mut posts = write(&self.tables.posts, "posts.delete");
        posts.remove(&id).map(|_| ()).ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl JobsRepo for MemoryRepositories {
    async fn list_open(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, RepoError> {
        let jobs = read(&self.tables.jobs, "jobs.list_open");
        let mut open: Vec<JobRecord> = jobs
            .values()
            .filter(|job| job.open)
            .filter(|job| filter.remote.is_none_or(|remote| job.remote == remote))
            .cloned()
            .collect();
        open.sort_by(|a, b| {
            b.posted_at
                .cmp(&a.posted_at)
                .then_with(|| a.slug.cmp(&b.slug))
        });
        Ok(open)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<JobRecord>, RepoError> {
        let jobs = read(&self.tables.jobs, "jobs.find_by_slug");
        Ok(jobs.values().find(|job| job.slug == slug).cloned())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, RepoError> {
        let jobs = read(&self.tables.jobs, "jobs.slug_exists");
        Ok(jobs.values().any(|job| job.slug == slug))
    }
}

#[async_trait]
impl JobsWriteRepo for MemoryRepositories {
    async fn create_job(&self, params: CreateJobParams) -> Result<JobRecord, RepoError> {
        let mut jobs = write(&self.tables.jobs, "jobs.create");
        if jobs.values().any(|job| job.slug == params.slug) {
            return Err(duplicate_slug("jobs_slug_key"));
        }

        let now = OffsetDateTime::now_utc();
        let record = JobRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            title: params.title,
            company: params.company,
            location: params.location,
            remote: params.remote,
            description: params.description,
            open: true,
            posted_at: now,
            updated_at: now,
        };
        jobs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_job(&self, params: UpdateJobParams) -> Result<JobRecord, RepoError> {
        let mut jobs = write(&self.tables.jobs, "jobs.update");
        let record = jobs.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        record.title = params.title;
        record.company = params.company;
        record.location = params.location;
        record.remote = params.remote;
        record.description = params.description;
        record.open = params.open;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn delete_job(&self, id: Uuid) -> Result<(), RepoError> {
        let mut jobs = write(&self.tables.jobs, "jobs.delete");
        jobs.remove(&id).map(|_| ()).ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl StatsRepo for MemoryRepositories {
    async fn dashboard_stats(&self, now: OffsetDateTime) -> Result<DashboardStats, RepoError> {
        let (events_total, events_upcoming) = {
            let events = read(&self.tables.events, "stats.events");
            let upcoming = events.values().filter(|e| e.is_upcoming(now)).count();
            (events.len(), upcoming)
        };
        let (posts_total, posts_published) = {
            let posts = read(&self.tables.posts, "stats.posts");
            let published = posts.values().filter(|p| p.is_published()).count();
            (posts.len(), published)
        };
        let (jobs_total, jobs_open, jobs_remote) = {
            let jobs = read(&self.tables.jobs, "stats.jobs");
            let open = jobs.values().filter(|j| j.open).count();
            let remote = jobs.values().filter(|j| j.open && j.remote).count();
            (jobs.len(), open, remote)
        };

        Ok(DashboardStats {
            events_total: events_total as u64,
            events_upcoming: events_upcoming as u64,
            posts_total: posts_total as u64,
            posts_published: posts_published as u64,
            jobs_total: jobs_total as u64,
            jobs_open: jobs_open as u64,
            jobs_remote: jobs_remote as u64,
        })
    }
}
