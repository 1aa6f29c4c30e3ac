//! Error types for the EDI exchange engine.
//!
//! Fatal paths of every lifecycle action surface as [`EdiError`]. Recordable
//! failures never reach this type unless strict mode is requested; transient
//! failures surface as [`EdiError::RetryLater`] so the job collaborator can
//! re-run the action.

use crate::config::ConfigurationError;
use crate::encoding::EncodingError;
use crate::events::NotificationError;
use crate::orchestration::error_classifier::HandlerError;
use crate::orchestration::job_queue::{JobQueueError, RetryRequest};
use crate::persistence::PersistenceError;
use crate::state_machine::GuardError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EdiError {
    #[error("Guard violation: {0}")]
    GuardViolation(#[from] GuardError),

    #[error("No handler found matching any of: {candidates:?}")]
    HandlerNotFound { candidates: Vec<String> },

    /// Distinguished signal asking the job collaborator to re-run the action later.
    #[error("Retry requested: {0}")]
    RetryLater(RetryRequest),

    #[error("Handler failure: {0}")]
    Handler(HandlerError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Job queue error: {0}")]
    JobQueue(#[from] JobQueueError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),
}

impl EdiError {
    /// Whether this error is the retry-later signal rather than a failure.
    pub fn is_retry(&self) -> bool {
        matches!(self, Self::RetryLater(_))
    }

    pub fn retry_request(&self) -> Option<&RetryRequest> {
        match self {
            Self::RetryLater(request) => Some(request),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EdiError>;
