//! Public read paths.
//!
//! Every accessor is one cached derived query: an operation id, its argument
//! tuple, a TTL tier and the tag of the data domain it reads.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::instrument;

use crate::application::error::AppError;
use crate::application::repos::{EventsRepo, JobFilter, JobsRepo, PostsRepo, StatsRepo};
use crate::cache::TagCache;
use crate::config::RevalidateSettings;
use crate::domain::entities::{DashboardStats, EventRecord, JobRecord, PostRecord};
use crate::domain::tags;

pub const OP_LIST_EVENTS: &str = "listEvents";
pub const OP_EVENT_BY_SLUG: &str = "eventBySlug";
pub const OP_LIST_POSTS: &str = "listPosts";
pub const OP_POST_BY_SLUG: &str = "postBySlug";
pub const OP_LIST_JOBS: &str = "listJobs";
pub const OP_JOB_BY_SLUG: &str = "jobBySlug";
pub const OP_DASHBOARD_STATS: &str = "dashboardStats";

#[derive(Clone)]
pub struct ListingService {
    events: Arc<dyn EventsRepo>,
    posts: Arc<dyn PostsRepo>,
    jobs: Arc<dyn JobsRepo>,
    stats: Arc<dyn StatsRepo>,
    cache: Arc<TagCache>,
    revalidate: RevalidateSettings,
}

impl ListingService {
    pub fn new(
        events: Arc<dyn EventsRepo>,
        posts: Arc<dyn PostsRepo>,
        jobs: Arc<dyn JobsRepo>,
        stats: Arc<dyn StatsRepo>,
        cache: Arc<TagCache>,
        revalidate: RevalidateSettings,
    ) -> Self {
        Self {
            events,
            posts,
            jobs,
            stats,
            cache,
            revalidate,
        }
    }

    #[instrument(skip(self))]
    pub async fn upcoming_events(&self, limit: usize) -> Result<Arc<Vec<EventRecord>>, AppError> {
        self.cache
            .cached(
                OP_LIST_EVENTS,
                &(limit,),
                self.revalidate.listings,
                &[tags::EVENTS],
                || async {
                    let events = self
                        .events
                        .list_upcoming(OffsetDateTime::now_utc(), limit)
                        .await?;
                    Ok::<_, AppError>(events)
                },
            )
            .await
    }

    /// A missing slug is cached as `None` for the shorter `missing` tier, so
    /// made-up slugs hold entries only until that TTL and the sweeper reclaim
    /// them. The next event write drops them sooner.
    #[instrument(skip(self))]
    pub async fn event(&self, slug: &str) -> Result<Arc<Option<EventRecord>>, AppError> {
        self.cache
            .cached_optional(
                OP_EVENT_BY_SLUG,
                &(slug,),
                self.revalidate.detail,
                self.revalidate.missing,
                &[tags::EVENTS],
                || async { Ok::<_, AppError>(self.events.find_by_slug(slug).await?) },
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn recent_posts(&self, limit: usize) -> Result<Arc<Vec<PostRecord>>, AppError> {
        self.cache
            .cached(
                OP_LIST_POSTS,
                &(limit,),
                self.revalidate.listings,
                &[tags::BLOG],
                || async { Ok::<_, AppError>(self.posts.list_recent(limit).await?) },
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn post(&self, slug: &str) -> Result<Arc<Option<PostRecord>>, AppError> {
        self.cache
            .cached_optional(
                OP_POST_BY_SLUG,
                &(slug,),
                self.revalidate.detail,
                self.revalidate.missing,
                &[tags::BLOG],
                || async {
                    let post = self.posts.find_by_slug(slug).await?;
                    Ok::<_, AppError>(post.filter(PostRecord::is_published))
                },
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn open_jobs(&self, filter: JobFilter) -> Result<Arc<Vec<JobRecord>>, AppError> {
        self.cache
            .cached(
                OP_LIST_JOBS,
                &(filter,),
                self.revalidate.listings,
                &[tags::JOBS],
                || async { Ok::<_, AppError>(self.jobs.list_open(&filter).await?) },
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn job(&self, slug: &str) -> Result<Arc<Option<JobRecord>>, AppError> {
        self.cache
            .cached_optional(
                OP_JOB_BY_SLUG,
                &(slug,),
                self.revalidate.detail,
                self.revalidate.missing,
                &[tags::JOBS],
                || async { Ok::<_, AppError>(self.jobs.find_by_slug(slug).await?) },
            )
            .await
    }

    /// Dashboard aggregates span every domain but are only tagged `stats`:
    /// they tolerate staleness up to their TTL and survive content writes.
    #[instrument(skip(self))]
    pub async fn dashboard_stats(&self) -> Result<Arc<DashboardStats>, AppError> {
        self.cache
            .cached(
                OP_DASHBOARD_STATS,
                &(),
                self.revalidate.stats,
                &[tags::STATS],
                || async {
                    let stats = self
                        .stats
                        .dashboard_stats(OffsetDateTime::now_utc())
                        .await?;
                    Ok::<_, AppError>(stats)
                },
            )
            .await
    }
}
