//! # Handler Error Classification
//!
//! Maps a handler failure to one of three outcomes:
//!
//! - **Retryable**: connectivity and filesystem faults. The action asks the job
//!   collaborator to re-run it later and leaves the record untouched.
//! - **Recordable**: validation and user-input faults. The failure is written to
//!   the record together with an error state and returned as a message, unless
//!   the caller runs the action in strict mode.
//! - **Fatal**: everything else. Propagates and leaves the record untouched.
//!
//! Classification is data driven: [`StandardErrorClassifier`] holds a table from
//! [`ErrorKind`] to [`ErrorClass`], and additional kinds can be registered into
//! either bucket. Lifecycle actions only ever go through
//! [`ErrorClassifier::absorb`].
//!
//! ## Usage
//!
//! ```rust
//! use edi_core::orchestration::error_classifier::{
//!     ErrorClass, ErrorClassifier, ErrorKind, HandlerError, StandardErrorClassifier,
//! };
//!
//! let classifier = StandardErrorClassifier::new()
//!     .with_kind(ErrorKind::custom("partner_rejected"), ErrorClass::Recordable);
//!
//! let error = HandlerError::new(ErrorKind::custom("partner_rejected"), "Unknown GLN");
//! assert_eq!(classifier.classify(&error), ErrorClass::Recordable);
//! assert_eq!(
//!     classifier.classify(&HandlerError::connection("SFTP refused")),
//!     ErrorClass::Retryable
//! );
//! ```

use crate::config::BackoffConfig;
use crate::constants::ExchangeAction;
use crate::error::{EdiError, Result};
use crate::models::RecordId;
use crate::orchestration::job_queue::RetryRequest;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io;
use tracing::debug;

/// Kind of a handler failure
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Generic I/O fault
    Io,
    /// Connection to an external system failed
    Connection,
    Timeout,
    FileNotFound,
    /// Content rejected by validation
    Validation,
    InvalidArgument,
    UserError,
    BusinessRule,
    Internal,
    /// Application-defined kind, fatal unless registered
    Custom(String),
}

impl ErrorKind {
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => f.write_str("io"),
            Self::Connection => f.write_str("connection"),
            Self::Timeout => f.write_str("timeout"),
            Self::FileNotFound => f.write_str("file_not_found"),
            Self::Validation => f.write_str("validation"),
            Self::InvalidArgument => f.write_str("invalid_argument"),
            Self::UserError => f.write_str("user_error"),
            Self::BusinessRule => f.write_str("business_rule"),
            Self::Internal => f.write_str("internal"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// Outcome of classifying a handler failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Retryable,
    Recordable,
    Fatal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retryable => f.write_str("retryable"),
            Self::Recordable => f.write_str("recordable"),
            Self::Fatal => f.write_str("fatal"),
        }
    }
}

/// Failure reported by a handler
#[derive(Debug)]
pub struct HandlerError {
    pub kind: ErrorKind,
    pub message: String,
    pub source: Option<anyhow::Error>,
}

impl HandlerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn user_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserError, message)
    }

    pub fn business_rule(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BusinessRule, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| -> &(dyn std::error::Error + 'static) { source.as_ref() })
    }
}

impl From<io::Error> for HandlerError {
    fn from(error: io::Error) -> Self {
        let kind = match error.kind() {
            io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::Timeout,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::BrokenPipe => ErrorKind::Connection,
            _ => ErrorKind::Io,
        };
        Self::new(kind, error.to_string()).with_source(error)
    }
}

pub type HandlerResult<T> = std::result::Result<T, HandlerError>;

/// Where a failure happened, used to build the retry signal
#[derive(Debug, Clone)]
pub struct FailureScope {
    pub record_id: RecordId,
    pub action: ExchangeAction,
    /// Re-raise recordable failures instead of recording them
    pub strict: bool,
    /// 1-based attempt counter from the job collaborator
    pub attempt: u32,
    pub backoff: BackoffConfig,
}

/// A recordable failure ready to be written to the record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFailure {
    pub kind: ErrorKind,
    pub message: String,
}

pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &HandlerError) -> ErrorClass;

    /// Turn a handler failure into a recorded failure, a retry signal or a
    /// propagated error.
    fn absorb(&self, error: HandlerError, scope: &FailureScope) -> Result<RecordedFailure> {
        let class = self.classify(&error);
        debug!(
            record_id = scope.record_id,
            action = %scope.action,
            kind = %error.kind,
            class = %class,
            "Classified handler failure"
        );

        match class {
            ErrorClass::Retryable => Err(EdiError::RetryLater(RetryRequest::from_backoff(
                scope.record_id,
                scope.action,
                error.message,
                scope.attempt,
                &scope.backoff,
            ))),
            ErrorClass::Recordable if !scope.strict => Ok(RecordedFailure {
                kind: error.kind,
                message: error.message,
            }),
            ErrorClass::Recordable | ErrorClass::Fatal => Err(EdiError::Handler(error)),
        }
    }
}

/// Table-driven classifier with the built-in buckets pre-registered
#[derive(Debug, Clone)]
pub struct StandardErrorClassifier {
    classes: HashMap<ErrorKind, ErrorClass>,
}

impl StandardErrorClassifier {
    pub fn new() -> Self {
        let classes = [
            (ErrorKind::Io, ErrorClass::Retryable),
            (ErrorKind::Connection, ErrorClass::Retryable),
            (ErrorKind::Timeout, ErrorClass::Retryable),
            (ErrorKind::FileNotFound, ErrorClass::Retryable),
            (ErrorKind::Validation, ErrorClass::Recordable),
            (ErrorKind::InvalidArgument, ErrorClass::Recordable),
            (ErrorKind::UserError, ErrorClass::Recordable),
            (ErrorKind::BusinessRule, ErrorClass::Recordable),
            (ErrorKind::Internal, ErrorClass::Fatal),
        ]
        .into_iter()
        .collect();
        Self { classes }
    }

    /// Register a kind into a bucket, replacing any previous class
    pub fn register(&mut self, kind: ErrorKind, class: ErrorClass) -> &mut Self {
        self.classes.insert(kind, class);
        self
    }

    pub fn with_kind(mut self, kind: ErrorKind, class: ErrorClass) -> Self {
        self.register(kind, class);
        self
    }
}

impl Default for StandardErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify(&self, error: &HandlerError) -> ErrorClass {
        self.classes
            .get(&error.kind)
            .copied()
            .unwrap_or(ErrorClass::Fatal)
    }
}
