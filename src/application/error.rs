use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::repos::RepoError,
    cache::CacheError,
    domain::{
        error::DomainError,
        slug::{SlugAsyncError, SlugError},
    },
    infra::error::InfraError,
};

/// Diagnostic chain attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
}

impl From<SlugError> for AppError {
    fn from(error: SlugError) -> Self {
        match error {
            SlugError::Exhausted { .. } => Self::Repo(RepoError::Duplicate {
                constraint: "slug".to_string(),
            }),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<SlugAsyncError<RepoError>> for AppError {
    fn from(error: SlugAsyncError<RepoError>) -> Self {
        match error {
            SlugAsyncError::Slug(err) => err.into(),
            SlugAsyncError::Predicate(err) => Self::Repo(err),
        }
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Repo(RepoError::NotFound) | AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Domain(_)
            | AppError::Repo(RepoError::InvalidInput { .. })
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Repo(RepoError::Duplicate { .. }) => StatusCode::CONFLICT,
            AppError::Repo(RepoError::Timeout)
            | AppError::Cache(CacheError::ProducerTimeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Repo(RepoError::Persistence(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Cache(CacheError::KeyDerivation(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Infra(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Repo(RepoError::NotFound) | AppError::NotFound => "Resource not found",
            AppError::Domain(_)
            | AppError::Repo(RepoError::InvalidInput { .. })
            | AppError::Validation(_) => "Request could not be processed",
            AppError::Repo(RepoError::Duplicate { .. }) => "Resource already exists",
            AppError::Repo(RepoError::Timeout) | AppError::Cache(CacheError::ProducerTimeout { .. }) => {
                "Upstream data source timed out"
            }
            AppError::Repo(RepoError::Persistence(_)) => "Service temporarily unavailable",
            AppError::Infra(InfraError::Configuration(_)) => "Service misconfigured",
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Bind { .. } | InfraError::Serve(_)) => {
                "HTTP listener failure"
            }
            AppError::Cache(CacheError::KeyDerivation(_)) => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn repo_not_found_maps_to_404() {
        let response = AppError::from(RepoError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.messages, vec!["resource not found".to_string()]);
    }

    #[test]
    fn domain_rejections_are_bad_requests() {
        let response = AppError::from(DomainError::EndsBeforeStart).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.messages[0], "event cannot end before it starts");
    }

    #[test]
    fn producer_timeout_maps_to_gateway_timeout() {
        let error = AppError::from(CacheError::ProducerTimeout {
            operation: "listJobs".to_string(),
            timeout: Duration::from_millis(250),
        });
        assert_eq!(error.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn slug_errors_become_validation_or_conflict() {
        assert_eq!(
            AppError::from(SlugError::EmptyInput).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(SlugError::Exhausted {
                base: "meetup".to_string()
            })
            .status_code(),
            StatusCode::CONFLICT
        );
    }
}
