//! # Batch Synchronizer
//!
//! Periodic sweeps reconciling pending exchange work of a backend.
//!
//! ## Output sweep
//!
//! 1. New output records without a file, of a type configured for
//!    auto-generation, get a `generate` job. Unless sending is skipped, a `send`
//!    job is chained to it at elevated priority.
//! 2. Unless sending is skipped, pending output records get a `send` job and
//!    records waiting for a state update (`output_sent_and_error`, and
//!    `output_sent` when sent records are not skipped) are checked inline.
//!
//! ## Input sweep
//!
//! 1. Pending input records without a file get a `receive` job.
//! 2. Received input records get a `process` job.
//!
//! Selections are scoped to the backend and may be narrowed to a set of record
//! ids; an empty set does not narrow.

use crate::config::SyncConfig;
use crate::constants::ExchangeAction;
use crate::error::{EdiError, Result};
use crate::logging::log_sync_operation;
use crate::models::{Backend, BackendId, ExchangeDirection, ExchangeTypeId, RecordId};
use crate::orchestration::job_queue::{JobHandle, JobPriority, JobRequest};
use crate::orchestration::system_context::SystemContext;
use crate::persistence::{Domain, Field};
use crate::state_machine::{ActionOutcome, CallOptions, ExchangeState, ExchangeStateMachine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutputOptions {
    /// Only generate missing output
    pub skip_send: bool,
    /// Ignore records that were already sent
    pub skip_sent: bool,
    pub record_ids: Vec<RecordId>,
}

impl SyncOutputOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            skip_send: config.skip_send,
            skip_sent: config.skip_sent,
            record_ids: Vec::new(),
        }
    }

    pub fn with_skip_send(mut self, skip_send: bool) -> Self {
        self.skip_send = skip_send;
        self
    }

    pub fn with_skip_sent(mut self, skip_sent: bool) -> Self {
        self.skip_sent = skip_sent;
        self
    }

    pub fn with_record_ids(mut self, record_ids: impl IntoIterator<Item = RecordId>) -> Self {
        self.record_ids = record_ids.into_iter().collect();
        self
    }
}

impl Default for SyncOutputOptions {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncInputOptions {
    pub record_ids: Vec<RecordId>,
}

impl SyncInputOptions {
    pub fn with_record_ids(mut self, record_ids: impl IntoIterator<Item = RecordId>) -> Self {
        self.record_ids = record_ids.into_iter().collect();
        self
    }
}

/// What one sweep did for one backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub backend_id: BackendId,
    pub dispatched: Vec<JobHandle>,
    /// Outcomes of checks run inline
    pub checked: Vec<ActionOutcome>,
}

impl SyncReport {
    fn new(backend_id: BackendId) -> Self {
        Self {
            backend_id,
            dispatched: Vec::new(),
            checked: Vec::new(),
        }
    }

    /// Jobs dispatched for one action
    pub fn dispatched_for(&self, action: ExchangeAction) -> impl Iterator<Item = &JobHandle> {
        self.dispatched
            .iter()
            .filter(move |handle| handle.action == action)
    }

    pub fn is_empty(&self) -> bool {
        self.dispatched.is_empty() && self.checked.is_empty()
    }
}

/// Selects pending records and dispatches lifecycle actions for them
#[derive(Debug, Clone)]
pub struct BatchSynchronizer {
    machine: ExchangeStateMachine,
}

impl BatchSynchronizer {
    pub fn new(context: Arc<SystemContext>) -> Self {
        Self {
            machine: ExchangeStateMachine::new(context),
        }
    }

    fn context(&self) -> &SystemContext {
        self.machine.context()
    }

    /// Output sweep options from configuration
    pub fn output_options(&self) -> SyncOutputOptions {
        SyncOutputOptions::from_config(&self.context().config.sync)
    }

    /// Sweep every active backend for output work
    pub async fn sync_all_output(&self) -> Result<Vec<SyncReport>> {
        let backend_ids: Vec<BackendId> = self
            .context()
            .catalog
            .active_backends()
            .into_iter()
            .map(|backend| backend.id)
            .collect();

        let mut reports = Vec::with_capacity(backend_ids.len());
        for backend_id in backend_ids {
            reports.push(self.sync_output(backend_id, self.output_options()).await?);
        }
        Ok(reports)
    }

    /// Sweep every active backend for input work
    pub async fn sync_all_input(&self) -> Result<Vec<SyncReport>> {
        let backend_ids: Vec<BackendId> = self
            .context()
            .catalog
            .active_backends()
            .into_iter()
            .map(|backend| backend.id)
            .collect();

        let mut reports = Vec::with_capacity(backend_ids.len());
        for backend_id in backend_ids {
            reports.push(
                self.sync_input(backend_id, SyncInputOptions::default())
                    .await?,
            );
        }
        Ok(reports)
    }

    pub async fn sync_output(
        &self,
        backend_id: BackendId,
        options: SyncOutputOptions,
    ) -> Result<SyncReport> {
        let context = self.context();
        let backend = self.backend(backend_id)?;
        let mut report = SyncReport::new(backend_id);

        let auto_types: Vec<ExchangeTypeId> = context
            .catalog
            .auto_generate_output_types(backend)
            .into_iter()
            .map(|exchange_type| exchange_type.id)
            .collect();
        let new_records = context
            .store
            .search(&output_new_records_domain(
                backend_id,
                &auto_types,
                &options.record_ids,
            ))
            .await?;
        info!(
            backend_id = backend_id,
            records = new_records.len(),
            "EDI exchange output sync: found new records to generate"
        );

        for record in &new_records {
            let generate = self
                .dispatch(
                    record.id,
                    ExchangeAction::Generate,
                    context.config.sync.default_priority,
                )
                .await?;
            if !options.skip_send {
                let send = context
                    .job_queue
                    .enqueue_after(
                        &generate,
                        JobRequest::new(record.id, ExchangeAction::Send)
                            .with_priority(context.config.sync.chained_send_priority),
                    )
                    .await?;
                report.dispatched.push(generate);
                report.dispatched.push(send);
            } else {
                report.dispatched.push(generate);
            }
        }

        if !options.skip_send {
            let pending_records = context
                .store
                .search(&output_pending_records_domain(
                    backend_id,
                    options.skip_sent,
                    &options.record_ids,
                ))
                .await?;
            info!(
                backend_id = backend_id,
                records = pending_records.len(),
                "EDI exchange output sync: found pending records"
            );

            for record in &pending_records {
                if record.state == ExchangeState::OutputPending {
                    report.dispatched.push(
                        self.dispatch(
                            record.id,
                            ExchangeAction::Send,
                            context.config.sync.default_priority,
                        )
                        .await?,
                    );
                } else {
                    report
                        .checked
                        .push(self.machine.check(record.id, CallOptions::default()).await?);
                }
            }
        }

        log_sync_operation(
            "sync_output",
            backend_id,
            report.dispatched.len(),
            report.checked.len(),
            None,
        );
        Ok(report)
    }

    pub async fn sync_input(
        &self,
        backend_id: BackendId,
        options: SyncInputOptions,
    ) -> Result<SyncReport> {
        let context = self.context();
        self.backend(backend_id)?;
        let mut report = SyncReport::new(backend_id);
        let priority = context.config.sync.default_priority;

        let pending_records = context
            .store
            .search(&input_pending_records_domain(backend_id, &options.record_ids))
            .await?;
        info!(
            backend_id = backend_id,
            records = pending_records.len(),
            "EDI exchange input sync: found pending records to receive"
        );
        for record in &pending_records {
            report.dispatched.push(
                self.dispatch(record.id, ExchangeAction::Receive, priority)
                    .await?,
            );
        }

        let received_records = context
            .store
            .search(&input_received_records_domain(backend_id, &options.record_ids))
            .await?;
        info!(
            backend_id = backend_id,
            records = received_records.len(),
            "EDI exchange input sync: found pending records to process"
        );
        for record in &received_records {
            report.dispatched.push(
                self.dispatch(record.id, ExchangeAction::Process, priority)
                    .await?,
            );
        }

        log_sync_operation(
            "sync_input",
            backend_id,
            report.dispatched.len(),
            report.checked.len(),
            None,
        );
        Ok(report)
    }

    fn backend(&self, backend_id: BackendId) -> Result<&Backend> {
        self.context()
            .catalog
            .backend(backend_id)
            .ok_or_else(|| EdiError::NotFound(format!("Backend {backend_id}")))
    }

    async fn dispatch(
        &self,
        record_id: RecordId,
        action: ExchangeAction,
        priority: JobPriority,
    ) -> Result<JobHandle> {
        let handle = self
            .context()
            .job_queue
            .enqueue(JobRequest::new(record_id, action).with_priority(priority))
            .await?;
        Ok(handle)
    }
}

fn scoped(backend_id: BackendId, direction: ExchangeDirection, record_ids: &[RecordId]) -> Domain {
    let domain = Domain::equal(Field::BackendId, backend_id)
        .and(Domain::equal(Field::Direction, direction));
    if record_ids.is_empty() {
        domain
    } else {
        domain.and(Domain::is_in(Field::Id, record_ids.iter().copied()))
    }
}

/// Output records needing content generation
pub fn output_new_records_domain(
    backend_id: BackendId,
    auto_generate_types: &[ExchangeTypeId],
    record_ids: &[RecordId],
) -> Domain {
    scoped(backend_id, ExchangeDirection::Output, record_ids)
        .and(Domain::is_in(Field::TypeId, auto_generate_types.iter().copied()))
        .and(Domain::equal(Field::State, ExchangeState::New))
        .and(Domain::equal(Field::HasFile, false))
}

/// Output records waiting to be sent or for a state update
pub fn output_pending_records_domain(
    backend_id: BackendId,
    skip_sent: bool,
    record_ids: &[RecordId],
) -> Domain {
    let mut states = vec![
        ExchangeState::OutputPending,
        ExchangeState::OutputSentAndError,
    ];
    if !skip_sent {
        states.push(ExchangeState::OutputSent);
    }
    scoped(backend_id, ExchangeDirection::Output, record_ids)
        .and(Domain::is_in(Field::State, states))
}

/// Input records waiting to be received
pub fn input_pending_records_domain(backend_id: BackendId, record_ids: &[RecordId]) -> Domain {
    scoped(backend_id, ExchangeDirection::Input, record_ids)
        .and(Domain::equal(Field::State, ExchangeState::InputPending))
        .and(Domain::equal(Field::HasFile, false))
}

/// Input records waiting to be processed
pub fn input_received_records_domain(backend_id: BackendId, record_ids: &[RecordId]) -> Domain {
    scoped(backend_id, ExchangeDirection::Input, record_ids)
        .and(Domain::equal(Field::State, ExchangeState::InputReceived))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExchangeFile, ExchangeRecord};
    use chrono::Utc;

    fn record(id: RecordId, direction: ExchangeDirection, state: ExchangeState) -> ExchangeRecord {
        let now = Utc::now();
        ExchangeRecord {
            id,
            identifier: format!("EDI/2026/{id:05}"),
            backend_id: 1,
            type_id: 10,
            type_code: "INVOICE_OUT".to_string(),
            direction,
            state,
            file: None,
            error: None,
            exchanged_on: None,
            model: None,
            res_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_output_new_domain() {
        let domain = output_new_records_domain(1, &[10], &[]);
        let mut candidate = record(1, ExchangeDirection::Output, ExchangeState::New);
        assert!(domain.matches(&candidate));

        candidate.file = ExchangeFile::from_bytes(b"x".to_vec());
        assert!(!domain.matches(&candidate));

        let other_type = output_new_records_domain(1, &[11], &[]);
        assert!(!other_type.matches(&record(1, ExchangeDirection::Output, ExchangeState::New)));
    }

    #[test]
    fn test_pending_domain_honours_skip_sent() {
        let sent = record(2, ExchangeDirection::Output, ExchangeState::OutputSent);
        assert!(!output_pending_records_domain(1, true, &[]).matches(&sent));
        assert!(output_pending_records_domain(1, false, &[]).matches(&sent));
    }

    #[test]
    fn test_empty_record_ids_do_not_narrow() {
        let pending = record(3, ExchangeDirection::Input, ExchangeState::InputPending);
        assert!(input_pending_records_domain(1, &[]).matches(&pending));
        assert!(input_pending_records_domain(1, &[3]).matches(&pending));
        assert!(!input_pending_records_domain(1, &[4]).matches(&pending));
        assert!(!input_pending_records_domain(2, &[]).matches(&pending));
    }

    #[test]
    fn test_options_default_from_config() {
        let options = SyncOutputOptions::default();
        assert!(!options.skip_send);
        assert!(options.skip_sent);
        assert!(options.record_ids.is_empty());
    }
}
