//! Error taxonomy shared by jobs, services and the HTTP layer

use serde::Serialize;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing credentials, unknown provider names, unparsable settings
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network failures, rate limits, malformed provider payloads
    #[error("external provider error: {0}")]
    External(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("job '{0}' is already registered")]
    DuplicateJob(String),

    #[error("job '{0}' not found")]
    JobNotFound(String),

    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),
}

/// Category reported to on-demand callers alongside the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    External,
    Evaluation,
    Persistence,
    NotFound,
    Validation,
    Scheduler,
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Configuration(_) => ErrorCategory::Configuration,
            AppError::External(_) => ErrorCategory::External,
            AppError::Evaluation(_) => ErrorCategory::Evaluation,
            AppError::Persistence(_) => ErrorCategory::Persistence,
            AppError::NotFound(_) => ErrorCategory::NotFound,
            AppError::Validation(_) => ErrorCategory::Validation,
            AppError::Scheduler(SchedulerError::JobNotFound(_)) => ErrorCategory::NotFound,
            AppError::Scheduler(_) => ErrorCategory::Scheduler,
        }
    }
}

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        AppError::Persistence(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::External(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::External(format!("malformed payload: {}", e))
    }
}
