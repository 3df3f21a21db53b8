use thiserror::Error;

/// Rejections raised while validating admin input for board content.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{field} must not be empty")]
    BlankField { field: &'static str },
    #[error("{field} must be at most {max} characters")]
    FieldTooLong { field: &'static str, max: usize },
    #[error("event cannot end before it starts")]
    EndsBeforeStart,
}
