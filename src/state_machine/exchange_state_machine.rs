//! # Exchange Lifecycle State Machine
//!
//! The lifecycle actions (generate, send, receive, process, check) of an
//! exchange record. Each action is one guarded read-compute-write cycle:
//!
//! 1. load the record with its backend and exchange type
//! 2. check the action guard (violation aborts, wrong state is a no-op)
//! 3. resolve and invoke the handler
//! 4. hand any handler failure to the error classifier
//! 5. write state, error, timestamp and file in a single store write
//! 6. notify
//!
//! Retry signals and fatal failures return before step 5, so the record is
//! never touched on those paths.

use super::guards::{ActionGuard, GenerateGuard, ProcessGuard, ReceiveGuard, SendGuard};
use super::states::ExchangeState;
use crate::constants::{noop_messages, ExchangeAction, StatusMessage};
use crate::encoding::encode_text;
use crate::error::{EdiError, Result};
use crate::events::NotificationError;
use crate::logging::log_exchange_operation;
use crate::models::{
    Backend, ExchangeFile, ExchangeRecord, ExchangeType, RecordId, RecordUpdate,
};
use crate::orchestration::error_classifier::{FailureScope, HandlerError, RecordedFailure};
use crate::orchestration::handler_resolver::{HandlerResolver, ResolvedHandler};
use crate::orchestration::job_queue::{JobExecutor, JobRequest};
use crate::orchestration::system_context::SystemContext;
use crate::registry::{GeneratedContent, Handler};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const EMPTY_FILE_NOT_ALLOWED: &str = "Empty files are not allowed for this exchange type";
const CHECK_ERROR_FALLBACK: &str = "Exchange check reported an error state";

/// Per-invocation options shared by every action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOptions {
    /// Re-raise recordable failures instead of recording them
    pub strict: bool,
    /// Attempt counter of the job running the action
    pub attempt: u32,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            strict: false,
            attempt: 1,
        }
    }
}

impl CallOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn attempt(attempt: u32) -> Self {
        Self {
            attempt,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Persist the generated content on the record
    pub store: bool,
    /// Discard an existing file and generate again
    pub force: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            store: true,
            force: false,
        }
    }
}

/// Human-readable result of a lifecycle action that did not raise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action: ExchangeAction,
    pub record_id: RecordId,
    /// Record state after the action
    pub state: ExchangeState,
    pub message: String,
    /// Content produced by generate
    pub output: Option<Vec<u8>>,
    /// Whether the record was written
    pub changed: bool,
}

impl ActionOutcome {
    fn unchanged(
        action: ExchangeAction,
        record: &ExchangeRecord,
        message: impl Into<String>,
    ) -> Self {
        Self {
            action,
            record_id: record.id,
            state: record.state,
            message: message.into(),
            output: None,
            changed: false,
        }
    }
}

/// A record together with the configuration it is exchanged under
#[derive(Debug, Clone)]
struct ActionTarget {
    record: ExchangeRecord,
    backend: Backend,
    exchange_type: ExchangeType,
}

/// Drives exchange records through their lifecycle
#[derive(Debug, Clone)]
pub struct ExchangeStateMachine {
    context: Arc<SystemContext>,
}

impl ExchangeStateMachine {
    pub fn new(context: Arc<SystemContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<SystemContext> {
        &self.context
    }

    /// Run a lifecycle action by key, generating with default options
    pub async fn execute_action(
        &self,
        action: ExchangeAction,
        record_id: RecordId,
        options: CallOptions,
    ) -> Result<ActionOutcome> {
        match action {
            ExchangeAction::Generate => {
                self.generate(record_id, GenerateOptions::default(), options)
                    .await
            }
            ExchangeAction::Send => self.send(record_id, options).await,
            ExchangeAction::Receive => self.receive(record_id, options).await,
            ExchangeAction::Process => self.process(record_id, options).await,
            ExchangeAction::Check => self.check(record_id, options).await,
            ExchangeAction::Validate => Err(EdiError::InvalidAction(format!(
                "{action} is not a lifecycle action"
            ))),
        }
    }

    /// Produce the content of an output record.
    ///
    /// Generation failures are never recorded: they either ask for a retry or
    /// propagate. Validation failures of the produced content are recorded as
    /// `validate_error` and the content is not stored.
    pub async fn generate(
        &self,
        record_id: RecordId,
        options: GenerateOptions,
        call: CallOptions,
    ) -> Result<ActionOutcome> {
        let action = ExchangeAction::Generate;
        let mut target = self.load(record_id).await?;
        let guard = GenerateGuard {
            force: options.force,
        };
        self.admit(&guard, &target)?;

        let discard = options.force && target.record.has_file();
        if discard {
            target.record.file = None;
        }

        let resolved = self.require_handler(&target, action)?;
        let Handler::Generate(handler) = &resolved.handler else {
            return Err(capability_mismatch(&resolved, action));
        };
        let generated = match handler.generate(&resolved.context).await {
            Ok(generated) => generated,
            Err(error) => {
                return Err(self.escalate(error, &self.scope(&target.record, action, call)))
            }
        };

        let output = match generated {
            None => None,
            Some(GeneratedContent::Bytes(bytes)) => Some(bytes),
            Some(GeneratedContent::Text(text)) => Some(encode_text(
                &text,
                target.exchange_type.encoding_or_default(),
                target.exchange_type.encoding_out_error_handler,
            )?),
        }
        .filter(|bytes| !bytes.is_empty());

        let mut update = RecordUpdate::new();
        if discard {
            update = update.file(None);
        }

        let (message, status) = match &output {
            None => (noop_messages::NOTHING_GENERATED.to_string(), None),
            Some(bytes) => match self.validate(&target, Some(bytes.as_slice())).await? {
                Some(failure) => {
                    update = update
                        .state(ExchangeState::ValidateError)
                        .error(failure.message);
                    (
                        StatusMessage::ValidateKo.text().to_string(),
                        Some(StatusMessage::ValidateKo),
                    )
                }
                None => {
                    if options.store {
                        update = update
                            .file(ExchangeFile::from_bytes(bytes.clone()))
                            .state(ExchangeState::OutputPending)
                            .clear_error();
                    }
                    (
                        StatusMessage::GenerateOk.text().to_string(),
                        Some(StatusMessage::GenerateOk),
                    )
                }
            },
        };

        let (record, changed) = self.apply(target.record, &update).await?;
        self.notify_complete(&record, action, status.map(|s| s.text()))
            .await;
        log_exchange_operation(
            action,
            record.id,
            &record.identifier,
            record.state.as_str(),
            Some(message.as_str()),
        );

        Ok(ActionOutcome {
            action,
            record_id: record.id,
            state: record.state,
            message,
            output,
            changed,
        })
    }

    /// Hand the file of an output record to its transport
    pub async fn send(&self, record_id: RecordId, call: CallOptions) -> Result<ActionOutcome> {
        let action = ExchangeAction::Send;
        let target = self.load(record_id).await?;
        if !self.admit(&SendGuard, &target)? {
            return Ok(self.skip(&target.record, action, noop_messages::ALREADY_SENT));
        }

        let resolved = self.require_handler(&target, action)?;
        let Handler::Send(handler) = &resolved.handler else {
            return Err(capability_mismatch(&resolved, action));
        };
        let sent = handler.send(&resolved.context).await;

        let now = Utc::now();
        let (update, status, message) = match sent {
            Ok(()) => {
                let state = if target.backend.output_sent_processed_auto {
                    ExchangeState::OutputSentAndProcessed
                } else {
                    ExchangeState::OutputSent
                };
                (
                    RecordUpdate::new().state(state).clear_error().stamp(now),
                    StatusMessage::SendOk,
                    StatusMessage::SendOk.text().to_string(),
                )
            }
            Err(error) => {
                let failure = self.absorb(error, &self.scope(&target.record, action, call))?;
                let message = format!("Error: {}", failure.message);
                (
                    RecordUpdate::new()
                        .state(ExchangeState::OutputErrorOnSend)
                        .error(failure.message)
                        .stamp(now),
                    StatusMessage::SendKo,
                    message,
                )
            }
        };

        let (record, changed) = self.apply(target.record, &update).await?;
        self.notify_complete(&record, action, Some(status.text()))
            .await;
        log_exchange_operation(
            action,
            record.id,
            &record.identifier,
            record.state.as_str(),
            Some(message.as_str()),
        );

        Ok(ActionOutcome {
            action,
            record_id: record.id,
            state: record.state,
            message,
            output: None,
            changed,
        })
    }

    /// Fetch the content of an input record and validate it
    pub async fn receive(&self, record_id: RecordId, call: CallOptions) -> Result<ActionOutcome> {
        let action = ExchangeAction::Receive;
        let target = self.load(record_id).await?;
        if !self.admit(&ReceiveGuard, &target)? {
            return Ok(self.skip(&target.record, action, noop_messages::ALREADY_RECEIVED));
        }

        let scope = self.scope(&target.record, action, call);
        let resolved = self.require_handler(&target, action)?;
        let Handler::Receive(handler) = &resolved.handler else {
            return Err(capability_mismatch(&resolved, action));
        };
        let received = match handler.receive(&resolved.context).await {
            Ok(received) => Ok(received),
            Err(error) => Err(self.absorb(error, &scope)?),
        };

        let now = Utc::now();
        let receive_error = |failure: RecordedFailure| {
            let message = format!("Input error: {}", failure.message);
            (
                RecordUpdate::new()
                    .state(ExchangeState::InputReceiveError)
                    .error(failure.message)
                    .stamp(now),
                StatusMessage::ReceiveKo,
                message,
            )
        };

        let (update, status, message) = match received {
            Err(failure) => receive_error(failure),
            Ok(None) => {
                debug!(record_id = record_id, "Nothing received yet");
                self.notify_complete(&target.record, action, None).await;
                return Ok(ActionOutcome::unchanged(
                    action,
                    &target.record,
                    noop_messages::NOTHING_RECEIVED,
                ));
            }
            Ok(Some(content)) => {
                let file = ExchangeFile::from_bytes(content);
                if file.is_none() && !target.exchange_type.allow_empty_files_on_receive {
                    let rejection = HandlerError::invalid_argument(EMPTY_FILE_NOT_ALLOWED);
                    receive_error(self.absorb(rejection, &scope)?)
                } else {
                    let content = file.as_ref().map(ExchangeFile::as_bytes);
                    match self.validate(&target, content).await? {
                        Some(failure) => {
                            let message = format!("Validation error: {}", failure.message);
                            (
                                RecordUpdate::new()
                                    .state(ExchangeState::ValidateError)
                                    .error(failure.message)
                                    .file(file)
                                    .stamp(now),
                                StatusMessage::ValidateKo,
                                message,
                            )
                        }
                        None => (
                            RecordUpdate::new()
                                .state(ExchangeState::InputReceived)
                                .clear_error()
                                .file(file)
                                .stamp(now),
                            StatusMessage::ReceiveOk,
                            StatusMessage::ReceiveOk.text().to_string(),
                        ),
                    }
                }
            }
        };

        let (record, changed) = self.apply(target.record, &update).await?;
        self.notify_complete(&record, action, Some(status.text()))
            .await;
        log_exchange_operation(
            action,
            record.id,
            &record.identifier,
            record.state.as_str(),
            Some(message.as_str()),
        );

        Ok(ActionOutcome {
            action,
            record_id: record.id,
            state: record.state,
            message,
            output: None,
            changed,
        })
    }

    /// Hand a received input record to its processor
    pub async fn process(&self, record_id: RecordId, call: CallOptions) -> Result<ActionOutcome> {
        let action = ExchangeAction::Process;
        let target = self.load(record_id).await?;
        if !self.admit(&ProcessGuard, &target)? {
            return Ok(self.skip(&target.record, action, noop_messages::ALREADY_PROCESSED));
        }
        let old_state = target.record.state;

        let resolved = self.require_handler(&target, action)?;
        let Handler::Process(handler) = &resolved.handler else {
            return Err(capability_mismatch(&resolved, action));
        };
        let processed = handler.process(&resolved.context).await;

        let now = Utc::now();
        let (update, status, message) = match processed {
            Ok(message) => (
                RecordUpdate::new()
                    .state(ExchangeState::InputProcessed)
                    .clear_error()
                    .stamp(now),
                StatusMessage::ProcessOk,
                message.unwrap_or_else(|| StatusMessage::ProcessOk.text().to_string()),
            ),
            Err(error) => {
                let failure = self.absorb(error, &self.scope(&target.record, action, call))?;
                let message = format!("Error: {}", failure.message);
                (
                    RecordUpdate::new()
                        .state(ExchangeState::InputProcessedError)
                        .error(failure.message)
                        .stamp(now),
                    StatusMessage::ProcessKo,
                    message,
                )
            }
        };

        let (record, changed) = self.apply(target.record, &update).await?;
        match record.state {
            ExchangeState::InputProcessedError
                if old_state != ExchangeState::InputProcessedError =>
            {
                let result = self
                    .context
                    .notifier
                    .notify_error(&record, StatusMessage::ProcessKo)
                    .await;
                log_notification_failure(&record, "error", result);
            }
            ExchangeState::InputProcessed => {
                let result = self.context.notifier.notify_done(&record).await;
                log_notification_failure(&record, "done", result);
            }
            _ => {}
        }
        self.notify_complete(&record, action, Some(status.text()))
            .await;
        log_exchange_operation(
            action,
            record.id,
            &record.identifier,
            record.state.as_str(),
            Some(message.as_str()),
        );

        Ok(ActionOutcome {
            action,
            record_id: record.id,
            state: record.state,
            message,
            output: None,
            changed,
        })
    }

    /// Let the check handler decide the record's state and error.
    ///
    /// There is no guard: the handler may move the record to any state,
    /// including out of a terminal one.
    pub async fn check(&self, record_id: RecordId, call: CallOptions) -> Result<ActionOutcome> {
        let action = ExchangeAction::Check;
        let target = self.load(record_id).await?;

        let resolved = self.require_handler(&target, action)?;
        let Handler::Check(handler) = &resolved.handler else {
            return Err(capability_mismatch(&resolved, action));
        };
        let outcome = match handler.check(&resolved.context).await {
            Ok(outcome) => outcome,
            Err(error) => {
                return Err(self.escalate(error, &self.scope(&target.record, action, call)))
            }
        };

        let current = &target.record;
        let state = outcome.state.unwrap_or(current.state);
        let error = if state.is_error() {
            outcome
                .error
                .filter(|text| !text.is_empty())
                .or_else(|| current.error.clone())
                .or_else(|| Some(CHECK_ERROR_FALLBACK.to_string()))
        } else {
            None
        };

        let mut update = RecordUpdate::new();
        if state != current.state {
            update = update.state(state);
        }
        if error != current.error {
            update = match &error {
                Some(text) => update.error(text.clone()),
                None => update.clear_error(),
            };
        }

        let message = outcome
            .message
            .unwrap_or_else(|| format!("Exchange state: {state}"));
        let (record, changed) = self.apply(target.record, &update).await?;
        self.notify_complete(&record, action, Some(message.as_str()))
            .await;
        log_exchange_operation(
            action,
            record.id,
            &record.identifier,
            record.state.as_str(),
            Some(message.as_str()),
        );

        Ok(ActionOutcome {
            action,
            record_id: record.id,
            state: record.state,
            message,
            output: None,
            changed,
        })
    }

    async fn load(&self, record_id: RecordId) -> Result<ActionTarget> {
        let record = self.context.store.get(record_id).await?;
        let backend = self
            .context
            .catalog
            .backend(record.backend_id)
            .cloned()
            .ok_or_else(|| {
                EdiError::NotFound(format!(
                    "Backend {} of exchange record {}",
                    record.backend_id, record.id
                ))
            })?;
        let exchange_type = self
            .context
            .catalog
            .exchange_type(record.type_id)
            .cloned()
            .ok_or_else(|| {
                EdiError::NotFound(format!(
                    "Exchange type {} ({}) of exchange record {}",
                    record.type_id, record.type_code, record.id
                ))
            })?;
        Ok(ActionTarget {
            record,
            backend,
            exchange_type,
        })
    }

    fn require_handler(
        &self,
        target: &ActionTarget,
        action: ExchangeAction,
    ) -> Result<ResolvedHandler> {
        self.context
            .resolver
            .resolve(
                &target.backend,
                &target.exchange_type,
                &target.record,
                action,
                false,
            )?
            .ok_or_else(|| EdiError::HandlerNotFound {
                candidates: HandlerResolver::usage_candidates(
                    &target.exchange_type,
                    action,
                ),
            })
    }

    /// Run the validate handler, if any, against content.
    ///
    /// Validation failures are always recorded, whatever the call options.
    async fn validate(
        &self,
        target: &ActionTarget,
        content: Option<&[u8]>,
    ) -> Result<Option<RecordedFailure>> {
        let action = ExchangeAction::Validate;
        let Some(resolved) = self.context.resolver.resolve(
            &target.backend,
            &target.exchange_type,
            &target.record,
            action,
            true,
        )?
        else {
            return Ok(None);
        };
        let Handler::Validate(handler) = &resolved.handler else {
            return Err(capability_mismatch(&resolved, action));
        };

        match handler.validate(&resolved.context, content).await {
            Ok(()) => Ok(None),
            Err(error) => {
                let scope = self.scope(&target.record, action, CallOptions::default());
                self.absorb(error, &scope).map(Some)
            }
        }
    }

    fn scope(
        &self,
        record: &ExchangeRecord,
        action: ExchangeAction,
        call: CallOptions,
    ) -> FailureScope {
        FailureScope {
            record_id: record.id,
            action,
            strict: call.strict,
            attempt: call.attempt,
            backoff: self.context.config.backoff.clone(),
        }
    }

    fn absorb(&self, error: HandlerError, scope: &FailureScope) -> Result<RecordedFailure> {
        self.context.classifier.absorb(error, scope)
    }

    /// Classify a failure on a path that has no error state to record it in
    fn escalate(&self, error: HandlerError, scope: &FailureScope) -> EdiError {
        let strict = FailureScope {
            strict: true,
            ..scope.clone()
        };
        match self.absorb(error, &strict) {
            Ok(failure) => EdiError::Handler(HandlerError::new(failure.kind, failure.message)),
            Err(err) => err,
        }
    }

    async fn apply(
        &self,
        record: ExchangeRecord,
        update: &RecordUpdate,
    ) -> Result<(ExchangeRecord, bool)> {
        if update.is_empty() {
            return Ok((record, false));
        }
        let written = self.context.store.write(record.id, update).await?;
        Ok((written, true))
    }

    /// Evaluate an action guard, logging violations before they propagate
    fn admit(&self, guard: &impl ActionGuard, target: &ActionTarget) -> Result<bool> {
        guard
            .check(&target.record, &target.exchange_type)
            .map_err(|violation| {
                warn!(
                    record_id = target.record.id,
                    state = %target.record.state,
                    guard = guard.description(),
                    error = %violation,
                    "Guard violation"
                );
                violation.into()
            })
    }

    fn skip(
        &self,
        record: &ExchangeRecord,
        action: ExchangeAction,
        message: &str,
    ) -> ActionOutcome {
        debug!(
            record_id = record.id,
            action = %action,
            state = %record.state,
            "Action does not apply to current state"
        );
        ActionOutcome::unchanged(action, record, message)
    }

    async fn notify_complete(
        &self,
        record: &ExchangeRecord,
        action: ExchangeAction,
        message: Option<&str>,
    ) {
        let result = self
            .context
            .notifier
            .notify_action_complete(record, action, message)
            .await;
        log_notification_failure(record, action.as_str(), result);
    }
}

#[async_trait]
impl JobExecutor for ExchangeStateMachine {
    async fn execute(&self, job: &JobRequest) -> Result<ActionOutcome> {
        self.execute_action(job.action, job.record_id, CallOptions::attempt(job.attempt))
            .await
    }
}

fn capability_mismatch(resolved: &ResolvedHandler, action: ExchangeAction) -> EdiError {
    EdiError::InvalidAction(format!(
        "Handler {} serves {}, not {action}",
        resolved.name,
        resolved.handler.capability()
    ))
}

fn log_notification_failure(
    record: &ExchangeRecord,
    notification: &str,
    result: std::result::Result<(), NotificationError>,
) {
    if let Err(error) = result {
        warn!(
            record_id = record.id,
            notification = %notification,
            error = %error,
            "Exchange notification failed"
        );
    }
}
