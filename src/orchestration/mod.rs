//! # Orchestration Engine
//!
//! Exchange orchestration around the lifecycle state machine.
//!
//! ## Core Components
//!
//! - **HandlerResolver**: picks the pluggable handler for a record and action key
//! - **ErrorClassifier**: maps handler failures to retryable, recordable or fatal
//! - **BatchSynchronizer**: periodic sweeps dispatching pending work as jobs
//! - **ExchangeBackend**: backend-scoped record creation, lookup and actions
//! - **JobQueue**: asynchronous job collaborator with completion chaining
//! - **SystemContext**: dependency container shared by all of the above
//!
//! ```text
//! ┌──────────────────┐    ┌──────────────────┐    ┌──────────────────┐
//! │ BatchSynchronizer│───▶│ JobQueue         │───▶│ ExchangeState-   │
//! │ (sweeps)         │    │ (jobs, chaining) │    │ Machine (actions)│
//! └──────────────────┘    └──────────────────┘    └────────┬─────────┘
//!                                                          │
//!                              ┌───────────────────────────┼──────────────┐
//!                              ▼                           ▼              ▼
//!                     ┌─────────────────┐      ┌─────────────────┐  ┌──────────┐
//!                     │ HandlerResolver │      │ ErrorClassifier │  │ Store    │
//!                     └─────────────────┘      └─────────────────┘  └──────────┘
//! ```

pub mod backend;
pub mod error_classifier;
pub mod handler_resolver;
pub mod job_queue;
pub mod synchronizer;
pub mod system_context;

pub use backend::{ExchangeBackend, ExistingRecords};
pub use error_classifier::{
    ErrorClass, ErrorClassifier, ErrorKind, FailureScope, HandlerError, HandlerResult,
    RecordedFailure, StandardErrorClassifier,
};
pub use handler_resolver::{HandlerResolver, ResolvedHandler};
pub use job_queue::{
    InMemoryJobQueue, JobExecutor, JobHandle, JobPriority, JobQueue, JobQueueError, JobRequest,
    JobSnapshot, JobStatus, RetryRequest, RunSummary,
};
pub use synchronizer::{BatchSynchronizer, SyncInputOptions, SyncOutputOptions, SyncReport};
pub use system_context::{SystemContext, SystemContextBuilder};
