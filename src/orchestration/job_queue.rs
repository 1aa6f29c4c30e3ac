//! # Asynchronous Job Collaborator
//!
//! Lifecycle actions dispatched by the synchronizer run as jobs. The engine only
//! relies on the [`JobQueue`] seam (enqueue, enqueue after a parent) and on the
//! retry-later signal carried by [`RetryRequest`]. [`InMemoryJobQueue`] is a
//! reference implementation with priorities, completion chaining and retries.

use crate::config::BackoffConfig;
use crate::constants::{system, ExchangeAction};
use crate::error::{EdiError, Result};
use crate::logging::log_error;
use crate::models::RecordId;
use crate::state_machine::ActionOutcome;
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lower values run first
pub type JobPriority = u8;

/// A lifecycle action to run asynchronously on one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_id: Uuid,
    pub record_id: RecordId,
    pub action: ExchangeAction,
    pub priority: JobPriority,
    /// 1-based attempt counter
    pub attempt: u32,
}

impl JobRequest {
    pub fn new(record_id: RecordId, action: ExchangeAction) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            record_id,
            action,
            priority: system::DEFAULT_JOB_PRIORITY,
            attempt: 1,
        }
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Reference to an enqueued job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub record_id: RecordId,
    pub action: ExchangeAction,
    pub priority: JobPriority,
    /// Parent job this one waits for
    pub depends_on: Option<Uuid>,
}

/// Retry-later signal raised by an action hitting a transient failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryRequest {
    pub record_id: RecordId,
    pub action: ExchangeAction,
    pub reason: String,
    /// Attempt that failed
    pub attempt: u32,
    pub retry_after: Duration,
    pub max_retries: u32,
}

impl RetryRequest {
    pub fn from_backoff(
        record_id: RecordId,
        action: ExchangeAction,
        reason: impl Into<String>,
        attempt: u32,
        backoff: &BackoffConfig,
    ) -> Self {
        Self {
            record_id,
            action,
            reason: reason.into(),
            attempt,
            retry_after: backoff.delay_for_attempt(attempt),
            max_retries: backoff.max_retries,
        }
    }

    /// Whether another attempt is allowed
    pub fn can_retry(&self) -> bool {
        self.attempt <= self.max_retries
    }
}

impl fmt::Display for RetryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on record {} (attempt {}/{}), retry in {}s: {}",
            self.action,
            self.record_id,
            self.attempt,
            self.max_retries + 1,
            self.retry_after.as_secs(),
            self.reason
        )
    }
}

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("Unknown parent job {0}")]
    UnknownParent(Uuid),

    #[error("Action {0} cannot be dispatched as a job")]
    NotDispatchable(ExchangeAction),

    #[error("Job queue unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, request: JobRequest) -> std::result::Result<JobHandle, JobQueueError>;

    /// Enqueue a job that runs only once `parent` completed successfully
    async fn enqueue_after(
        &self,
        parent: &JobHandle,
        request: JobRequest,
    ) -> std::result::Result<JobHandle, JobQueueError>;
}

/// Runs one job, usually by invoking the matching lifecycle action
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: &JobRequest) -> Result<ActionOutcome>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Ready once due
    Pending,
    /// Waiting for its parent job
    Waiting,
    Running,
    Succeeded { message: String },
    Failed { reason: String },
    /// Parent failed or was cancelled
    Cancelled,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::Cancelled
        )
    }
}

#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub request: JobRequest,
    pub depends_on: Option<Uuid>,
    pub status: JobStatus,
}

/// Totals of one [`InMemoryJobQueue::run_pending`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub retried: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Debug)]
struct JobEntry {
    request: JobRequest,
    depends_on: Option<Uuid>,
    status: JobStatus,
    sequence: u64,
    not_before: Option<Instant>,
}

#[derive(Debug, Default)]
struct QueueState {
    jobs: HashMap<Uuid, JobEntry>,
    next_sequence: u64,
}

impl QueueState {
    fn insert(
        &mut self,
        request: JobRequest,
        depends_on: Option<Uuid>,
        status: JobStatus,
    ) -> JobHandle {
        let handle = JobHandle {
            job_id: request.job_id,
            record_id: request.record_id,
            action: request.action,
            priority: request.priority,
            depends_on,
        };
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.jobs.insert(
            request.job_id,
            JobEntry {
                request,
                depends_on,
                status,
                sequence,
                not_before: None,
            },
        );
        handle
    }

    /// Ready jobs of the most urgent priority level, in enqueue order
    fn take_ready_batch(&mut self, now: Instant) -> Vec<JobRequest> {
        let ready = |entry: &JobEntry| {
            entry.status == JobStatus::Pending && entry.not_before.map_or(true, |at| at <= now)
        };
        let Some(priority) = self
            .jobs
            .values()
            .filter(|&entry| ready(entry))
            .map(|entry| entry.request.priority)
            .min()
        else {
            return Vec::new();
        };

        let mut batch: Vec<&mut JobEntry> = self
            .jobs
            .values_mut()
            .filter(|entry| ready(&**entry) && entry.request.priority == priority)
            .collect();
        batch.sort_by_key(|entry| entry.sequence);
        batch
            .into_iter()
            .map(|entry| {
                entry.status = JobStatus::Running;
                entry.request.clone()
            })
            .collect()
    }

    fn release_dependents(&mut self, parent: Uuid) {
        for entry in self.jobs.values_mut() {
            if entry.depends_on == Some(parent) && entry.status == JobStatus::Waiting {
                entry.status = JobStatus::Pending;
            }
        }
    }

    /// Cancel every job transitively depending on `parent`
    fn cancel_dependents(&mut self, parent: Uuid) -> usize {
        let mut cancelled = 0;
        let mut parents = vec![parent];
        while let Some(current) = parents.pop() {
            for (job_id, entry) in self.jobs.iter_mut() {
                if entry.depends_on == Some(current) && !entry.status.is_finished() {
                    entry.status = JobStatus::Cancelled;
                    cancelled += 1;
                    parents.push(*job_id);
                }
            }
        }
        cancelled
    }
}

/// In-process job queue driven explicitly by [`InMemoryJobQueue::run_pending`]
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, job_id: Uuid) -> Option<JobStatus> {
        self.state.lock().jobs.get(&job_id).map(|entry| entry.status.clone())
    }

    /// All jobs in enqueue order
    pub fn jobs(&self) -> Vec<JobSnapshot> {
        let state = self.state.lock();
        let mut entries: Vec<&JobEntry> = state.jobs.values().collect();
        entries.sort_by_key(|entry| entry.sequence);
        entries
            .into_iter()
            .map(|entry| JobSnapshot {
                request: entry.request.clone(),
                depends_on: entry.depends_on,
                status: entry.status.clone(),
            })
            .collect()
    }

    /// Jobs not finished yet
    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .jobs
            .values()
            .filter(|entry| !entry.status.is_finished())
            .count()
    }

    /// Make every delayed retry due immediately
    pub fn retry_now(&self) {
        for entry in self.state.lock().jobs.values_mut() {
            entry.not_before = None;
        }
    }

    /// Run due jobs until none is ready.
    ///
    /// Each round runs the ready jobs of the most urgent priority concurrently.
    /// Retries scheduled for later are left in the queue.
    pub async fn run_pending(&self, executor: &dyn JobExecutor) -> RunSummary {
        let mut summary = RunSummary::default();

        loop {
            let batch = self.state.lock().take_ready_batch(Instant::now());
            if batch.is_empty() {
                break;
            }
            debug!(jobs = batch.len(), "Running job batch");

            let results = join_all(batch.iter().map(|job| executor.execute(job))).await;

            let mut state = self.state.lock();
            for (job, result) in batch.into_iter().zip(results) {
                self.complete(&mut state, job, result, &mut summary);
            }
        }

        if summary != RunSummary::default() {
            info!(
                succeeded = summary.succeeded,
                retried = summary.retried,
                failed = summary.failed,
                cancelled = summary.cancelled,
                "Job queue drained"
            );
        }
        summary
    }

    fn complete(
        &self,
        state: &mut QueueState,
        job: JobRequest,
        result: Result<ActionOutcome>,
        summary: &mut RunSummary,
    ) {
        let job_id = job.job_id;
        match result {
            Ok(outcome) => {
                if let Some(entry) = state.jobs.get_mut(&job_id) {
                    entry.status = JobStatus::Succeeded {
                        message: outcome.message,
                    };
                }
                state.release_dependents(job_id);
                summary.succeeded += 1;
            }
            Err(EdiError::RetryLater(request)) if request.can_retry() => {
                warn!(
                    job_id = %job_id,
                    record_id = job.record_id,
                    action = %job.action,
                    attempt = job.attempt,
                    retry_after_secs = request.retry_after.as_secs(),
                    reason = %request.reason,
                    "Job asked to be retried"
                );
                if let Some(entry) = state.jobs.get_mut(&job_id) {
                    entry.request.attempt = job.attempt + 1;
                    entry.status = JobStatus::Pending;
                    entry.not_before = Some(Instant::now() + request.retry_after);
                }
                summary.retried += 1;
            }
            Err(err) => {
                let reason = match &err {
                    EdiError::RetryLater(request) => {
                        format!("Max retries exceeded: {}", request.reason)
                    }
                    other => other.to_string(),
                };
                log_error(
                    "job_queue",
                    job.action.as_str(),
                    &reason,
                    Some(
                        format!(
                            "job_id={job_id} record_id={} attempt={}",
                            job.record_id, job.attempt
                        )
                        .as_str(),
                    ),
                );
                if let Some(entry) = state.jobs.get_mut(&job_id) {
                    entry.status = JobStatus::Failed { reason };
                }
                summary.failed += 1;
                summary.cancelled += state.cancel_dependents(job_id);
            }
        }
    }
}

fn ensure_dispatchable(request: &JobRequest) -> std::result::Result<(), JobQueueError> {
    if request.action.is_lifecycle() {
        Ok(())
    } else {
        Err(JobQueueError::NotDispatchable(request.action))
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, request: JobRequest) -> std::result::Result<JobHandle, JobQueueError> {
        ensure_dispatchable(&request)?;
        debug!(
            job_id = %request.job_id,
            record_id = request.record_id,
            action = %request.action,
            priority = request.priority,
            "Enqueued job"
        );
        Ok(self.state.lock().insert(request, None, JobStatus::Pending))
    }

    async fn enqueue_after(
        &self,
        parent: &JobHandle,
        request: JobRequest,
    ) -> std::result::Result<JobHandle, JobQueueError> {
        ensure_dispatchable(&request)?;
        let mut state = self.state.lock();
        let status = match state.jobs.get(&parent.job_id).map(|entry| &entry.status) {
            None => return Err(JobQueueError::UnknownParent(parent.job_id)),
            Some(JobStatus::Succeeded { .. }) => JobStatus::Pending,
            Some(JobStatus::Failed { .. }) | Some(JobStatus::Cancelled) => JobStatus::Cancelled,
            Some(_) => JobStatus::Waiting,
        };
        debug!(
            job_id = %request.job_id,
            parent_job_id = %parent.job_id,
            action = %request.action,
            "Enqueued chained job"
        );
        Ok(state.insert(request, Some(parent.job_id), status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::error_classifier::HandlerError;
    use crate::state_machine::ExchangeState;
    use std::collections::VecDeque;

    /// Executor replaying scripted results per (record, action) and logging calls
    #[derive(Default)]
    struct ScriptedExecutor {
        script: Mutex<HashMap<(RecordId, ExchangeAction), VecDeque<Result<()>>>>,
        calls: Mutex<Vec<(RecordId, ExchangeAction, u32)>>,
    }

    impl ScriptedExecutor {
        fn push(&self, record_id: RecordId, action: ExchangeAction, result: Result<()>) {
            self.script
                .lock()
                .entry((record_id, action))
                .or_default()
                .push_back(result);
        }
    }

    #[async_trait]
    impl JobExecutor for ScriptedExecutor {
        async fn execute(&self, job: &JobRequest) -> Result<ActionOutcome> {
            self.calls.lock().push((job.record_id, job.action, job.attempt));
            let scripted = self
                .script
                .lock()
                .get_mut(&(job.record_id, job.action))
                .and_then(VecDeque::pop_front)
                .unwrap_or(Ok(()));
            scripted.map(|()| ActionOutcome {
                action: job.action,
                record_id: job.record_id,
                state: ExchangeState::OutputSent,
                message: "ok".to_string(),
                output: None,
                changed: true,
            })
        }
    }

    fn retry(record_id: RecordId, attempt: u32, max_retries: u32) -> EdiError {
        EdiError::RetryLater(RetryRequest {
            record_id,
            action: ExchangeAction::Send,
            reason: "connection refused".to_string(),
            attempt,
            retry_after: Duration::from_secs(60),
            max_retries,
        })
    }

    #[tokio::test]
    async fn test_priority_order() {
        let queue = InMemoryJobQueue::new();
        let executor = ScriptedExecutor::default();
        queue
            .enqueue(JobRequest::new(1, ExchangeAction::Generate))
            .await
            .unwrap();
        queue
            .enqueue(JobRequest::new(2, ExchangeAction::Send).with_priority(0))
            .await
            .unwrap();

        let summary = queue.run_pending(&executor).await;

        assert_eq!(summary.succeeded, 2);
        let order: Vec<_> = executor.calls.lock().iter().map(|c| c.0).collect();
        assert_eq!(order, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_chained_job_runs_after_parent() {
        let queue = InMemoryJobQueue::new();
        let executor = ScriptedExecutor::default();
        let parent = queue
            .enqueue(JobRequest::new(1, ExchangeAction::Generate))
            .await
            .unwrap();
        let child = queue
            .enqueue_after(&parent, JobRequest::new(1, ExchangeAction::Send).with_priority(0))
            .await
            .unwrap();
        assert_eq!(queue.status(child.job_id), Some(JobStatus::Waiting));

        queue.run_pending(&executor).await;

        let calls: Vec<_> = executor.calls.lock().iter().map(|c| c.1).collect();
        assert_eq!(calls, vec![ExchangeAction::Generate, ExchangeAction::Send]);
        assert_eq!(child.depends_on, Some(parent.job_id));
        assert_eq!(queue.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_parent_cancels_chain() {
        let queue = InMemoryJobQueue::new();
        let executor = ScriptedExecutor::default();
        executor.push(
            1,
            ExchangeAction::Generate,
            Err(EdiError::Handler(HandlerError::internal("template missing"))),
        );
        let parent = queue
            .enqueue(JobRequest::new(1, ExchangeAction::Generate))
            .await
            .unwrap();
        let child = queue
            .enqueue_after(&parent, JobRequest::new(1, ExchangeAction::Send))
            .await
            .unwrap();

        let summary = queue.run_pending(&executor).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(queue.status(child.job_id), Some(JobStatus::Cancelled));
        assert_eq!(executor.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_is_delayed_then_rerun_with_next_attempt() {
        let queue = InMemoryJobQueue::new();
        let executor = ScriptedExecutor::default();
        executor.push(7, ExchangeAction::Send, Err(retry(7, 1, 3)));
        let handle = queue
            .enqueue(JobRequest::new(7, ExchangeAction::Send))
            .await
            .unwrap();

        let first = queue.run_pending(&executor).await;
        assert_eq!(first.retried, 1);
        assert_eq!(queue.status(handle.job_id), Some(JobStatus::Pending));

        // Delayed retry is not due yet
        assert_eq!(queue.run_pending(&executor).await, RunSummary::default());

        queue.retry_now();
        let second = queue.run_pending(&executor).await;
        assert_eq!(second.succeeded, 1);
        assert_eq!(
            executor.calls.lock().last().copied(),
            Some((7, ExchangeAction::Send, 2))
        );
    }

    #[tokio::test]
    async fn test_retries_exhausted_fail_the_job() {
        let queue = InMemoryJobQueue::new();
        let executor = ScriptedExecutor::default();
        executor.push(7, ExchangeAction::Send, Err(retry(7, 2, 1)));
        let handle = queue
            .enqueue(JobRequest::new(7, ExchangeAction::Send))
            .await
            .unwrap();

        let summary = queue.run_pending(&executor).await;

        assert_eq!(summary.failed, 1);
        assert!(matches!(
            queue.status(handle.job_id),
            Some(JobStatus::Failed { reason }) if reason.starts_with("Max retries exceeded")
        ));
    }

    #[tokio::test]
    async fn test_validate_is_not_dispatchable() {
        let queue = InMemoryJobQueue::new();
        let err = queue
            .enqueue(JobRequest::new(1, ExchangeAction::Validate))
            .await
            .unwrap_err();
        assert!(matches!(err, JobQueueError::NotDispatchable(ExchangeAction::Validate)));
    }

    #[test]
    fn test_retry_request_display() {
        let request = match retry(3, 1, 2) {
            EdiError::RetryLater(request) => request,
            _ => unreachable!(),
        };
        assert_eq!(
            request.to_string(),
            "send on record 3 (attempt 1/3), retry in 60s: connection refused"
        );
    }
}
