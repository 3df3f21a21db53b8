//! Admin write paths.
//!
//! Each mutation validates its input, writes through the repository and, only
//! once the write succeeded, invalidates the cache tag of the resource.

use std::sync::Arc;

use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{
    CreateEventParams, CreateJobParams, CreatePostParams, EventsRepo, EventsWriteRepo, JobsRepo,
    JobsWriteRepo, PostsRepo, PostsWriteRepo, UpdateEventParams, UpdateJobParams,
    UpdatePostParams,
};
use crate::cache::{CacheTrigger, InvalidationReport};
use crate::domain::entities::{EventRecord, JobRecord, PostRecord};
use crate::domain::error::DomainError;
use crate::domain::slug::generate_unique_slug;

const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct EventCommand {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub location: String,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub ends_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostCommand {
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub body_markdown: String,
    /// Publish immediately; unpublished posts stay out of public listings.
    #[serde(default)]
    pub publish: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobCommand {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub remote: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_open")]
    pub open: bool,
}

fn default_open() -> bool {
    true
}

#[derive(Clone)]
pub struct AdminService {
    events: Arc<dyn EventsRepo>,
    events_write: Arc<dyn EventsWriteRepo>,
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    jobs: Arc<dyn JobsRepo>,
    jobs_write: Arc<dyn JobsWriteRepo>,
    trigger: CacheTrigger,
}

impl AdminService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        events: Arc<dyn EventsRepo>,
        events_write: Arc<dyn EventsWriteRepo>,
        posts: Arc<dyn PostsRepo>,
        posts_write: Arc<dyn PostsWriteRepo>,
        jobs: Arc<dyn JobsRepo>,
        jobs_write: Arc<dyn JobsWriteRepo>,
        trigger: CacheTrigger,
    ) -> Self {
        Self {
            events,
            events_write,
            posts,
            posts_write,
            jobs,
            jobs_write,
            trigger,
        }
    }

    pub fn trigger(&self) -> &CacheTrigger {
        &self.trigger
    }

    #[instrument(skip(self, command), fields(title = %command.title))]
    pub async fn create_event(&self, command: EventCommand) -> Result<EventRecord, AppError> {
        validate_event(&command)?;
        let events = Arc::clone(&self.events);
        let slug = generate_unique_slug(&command.title, |candidate| {
            let events = Arc::clone(&events);
            async move { events.slug_exists(&candidate).await.map(|taken| !taken) }
        })
        .await?;

        let record = self
            .events_write
            .create_event(CreateEventParams {
                slug,
                title: command.title.trim().to_string(),
                summary: command.summary,
                location: command.location,
                starts_at: command.starts_at,
                ends_at: command.ends_at,
            })
            .await?;

        log_write("event.create", &record.slug, self.trigger.events_changed());
        Ok(record)
    }

    #[instrument(skip(self, command))]
    pub async fn update_event(
        &self,
        id: Uuid,
        command: EventCommand,
    ) -> Result<EventRecord, AppError> {
        validate_event(&command)?;
        let record = self
            .events_write
            .update_event(UpdateEventParams {
                id,
                title: command.title.trim().to_string(),
                summary: command.summary,
                location: command.location,
                starts_at: command.starts_at,
                ends_at: command.ends_at,
            })
            .await?;

        log_write("event.update", &record.slug, self.trigger.events_changed());
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn delete_event(&self, id: Uuid) -> Result<(), AppError> {
        self.events_write.delete_event(id).await?;
        log_write("event.delete", &id.to_string(), self.trigger.events_changed());
        Ok(())
    }

    #[instrument(skip(self, command), fields(title = %command.title))]
    pub async fn create_post(&self, command: PostCommand) -> Result<PostRecord, AppError> {
        validate_title(&command.title)?;
        let posts = Arc::clone(&self.posts);
        let slug = generate_unique_slug(&command.title, |candidate| {
            let posts = Arc::clone(&posts);
            async move { posts.slug_exists(&candidate).await.map(|taken| !taken) }
        })
        .await?;

        let record = self
            .posts_write
            .create_post(CreatePostParams {
                slug,
                title: command.title.trim().to_string(),
                excerpt: command.excerpt,
                body_markdown: command.body_markdown,
                published_at: command.publish.then(OffsetDateTime::now_utc),
            })
            .await?;

        log_write("post.create", &record.slug, self.trigger.posts_changed());
        Ok(record)
    }

    #[instrument(skip(self, command))]
    pub async fn update_post(&self, id: Uuid, command: PostCommand) -> Result<PostRecord, AppError> {
        validate_title(&command.title)?;
        let record = self
            .posts_write
            .update_post(UpdatePostParams {
                id,
                title: command.title.trim().to_string(),
                excerpt: command.excerpt,
                body_markdown: command.body_markdown,
                published_at: command.publish.then(OffsetDateTime::now_utc),
            })
            .await?;

        log_write("post.update", &record.slug, self.trigger.posts_changed());
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn delete_post(&self, id: Uuid) -> Result<(), AppError> {
        self.posts_write.delete_post(id).await?;
        log_write("post.delete", &id.to_string(), self.trigger.posts_changed());
        Ok(())
    }

    #[instrument(skip(self, command), fields(title = %command.title))]
    pub async fn create_job(&self, command: JobCommand) -> Result<JobRecord, AppError> {
        validate_job(&command)?;
        let jobs = Arc::clone(&self.jobs);
        let slug_source = format!("{} {}", command.title, command.company);
        let slug = generate_unique_slug(&slug_source, |candidate| {
            let jobs = Arc::clone(&jobs);
            async move { jobs.slug_exists(&candidate).await.map(|taken| !taken) }
        })
        .await?;

        let record = self
            .jobs_write
            .create_job(CreateJobParams {
                slug,
                title: command.title.trim().to_string(),
                company: command.company.trim().to_string(),
                location: command.location,
                remote: command.remote,
                description: command.description,
            })
            .await?;

        log_write("job.create", &record.slug, self.trigger.jobs_changed());
        Ok(record)
    }

    #[instrument(skip(self, command))]
    pub async fn update_job(&self, id: Uuid, command: JobCommand) -> Result<JobRecord, AppError> {
        validate_job(&command)?;
        let record = self
            .jobs_write
            .update_job(UpdateJobParams {
                id,
                title: command.title.trim().to_string(),
                company: command.company.trim().to_string(),
                location: command.location,
                remote: command.remote,
                description: command.description,
                open: command.open,
            })
            .await?;

        log_write("job.update", &record.slug, self.trigger.jobs_changed());
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn delete_job(&self, id: Uuid) -> Result<(), AppError> {
        self.jobs_write.delete_job(id).await?;
        log_write("job.delete", &id.to_string(), self.trigger.jobs_changed());
        Ok(())
    }
}

fn log_write(action: &'static str, subject: &str, report: InvalidationReport) {
    info!(
        action,
        subject,
        purged = report.purged,
        "Admin write applied"
    );
}

fn validate_title(title: &str) -> Result<(), DomainError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::BlankField { field: "title" });
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::FieldTooLong {
            field: "title",
            max: MAX_TITLE_LEN,
        });
    }
    Ok(())
}

fn validate_event(command: &EventCommand) -> Result<(), DomainError> {
    validate_title(&command.title)?;
    if let Some(ends_at) = command.ends_at
        && ends_at < command.starts_at
    {
        return Err(DomainError::EndsBeforeStart);
    }
    Ok(())
}

fn validate_job(command: &JobCommand) -> Result<(), DomainError> {
    validate_title(&command.title)?;
    if command.company.trim().is_empty() {
        return Err(DomainError::BlankField { field: "company" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn event(title: &str) -> EventCommand {
        EventCommand {
            title: title.to_string(),
            summary: String::new(),
            location: "Berlin".to_string(),
            starts_at: datetime!(2026-11-02 18:00 UTC),
            ends_at: Some(datetime!(2026-11-02 21:00 UTC)),
        }
    }

    #[test]
    fn blank_titles_are_rejected() {
        assert!(matches!(
            validate_title("   "),
            Err(DomainError::BlankField { field: "title" })
        ));
        assert!(validate_title("Rust meetup").is_ok());
    }

    #[test]
    fn overlong_titles_are_rejected() {
        let title = "x".repeat(MAX_TITLE_LEN + 1);
        assert!(validate_title(&title).is_err());
    }

    #[test]
    fn events_must_not_end_before_they_start() {
        let mut command = event("Rust meetup");
        assert!(validate_event(&command).is_ok());

        command.ends_at = Some(datetime!(2026-11-01 18:00 UTC));
        assert!(validate_event(&command).is_err());
    }

    #[test]
    fn jobs_need_a_company() {
        let command = JobCommand {
            title: "Backend engineer".to_string(),
            company: " ".to_string(),
            location: String::new(),
            remote: true,
            description: String::new(),
            open: true,
        };
        assert!(validate_job(&command).is_err());
    }

    #[test]
    fn job_command_defaults_to_open() {
        let command: JobCommand =
            serde_json::from_str(r#"{"title":"SRE","company":"Acme"}"#).expect("json");
        assert!(command.open);
        assert!(!command.remote);
    }
}
