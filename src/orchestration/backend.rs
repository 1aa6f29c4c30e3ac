//! # Exchange Backend
//!
//! Backend-scoped entry point of the engine: record creation, exchange type
//! lookup, lookup of existing records, and the lifecycle actions of records
//! owned by the backend.
//!
//! ## Usage
//!
//! ```rust
//! use edi_core::models::{
//!     Backend, ExchangeCatalog, ExchangeDirection, ExchangeRecordValues, ExchangeType,
//! };
//! use edi_core::orchestration::{ExchangeBackend, SystemContext};
//! use edi_core::state_machine::ExchangeState;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let mut catalog = ExchangeCatalog::new();
//! catalog
//!     .add_backend(Backend::new(1, "ACME", "demo"))
//!     .add_exchange_type(ExchangeType::new(10, "INVOICE_OUT", ExchangeDirection::Output, "demo"));
//! let context = Arc::new(SystemContext::builder().with_catalog(catalog).build().unwrap());
//!
//! let backend = ExchangeBackend::new(context, 1).unwrap();
//! let record = backend
//!     .create_record("INVOICE_OUT", ExchangeRecordValues::for_document("account.move", 7))
//!     .await
//!     .unwrap();
//! assert_eq!(record.state, ExchangeState::New);
//! assert_eq!(record.direction, ExchangeDirection::Output);
//! # });
//! ```

use crate::constants::ExchangeAction;
use crate::error::{EdiError, Result};
use crate::models::{
    Backend, BackendId, ExchangeDirection, ExchangeRecord, ExchangeRecordValues, ExchangeType,
    NewExchangeRecord, RecordId,
};
use crate::orchestration::synchronizer::{
    BatchSynchronizer, SyncInputOptions, SyncOutputOptions, SyncReport,
};
use crate::orchestration::system_context::SystemContext;
use crate::persistence::{Domain, Field};
use crate::state_machine::{
    ActionOutcome, CallOptions, ExchangeState, ExchangeStateMachine, GenerateOptions,
};
use std::sync::Arc;
use tracing::info;

/// Result of [`ExchangeBackend::find_existing_exchange_records`]
#[derive(Debug, Clone, PartialEq)]
pub enum ExistingRecords {
    Records(Vec<ExchangeRecord>),
    Count(i64),
}

impl ExistingRecords {
    pub fn count(&self) -> i64 {
        match self {
            Self::Records(records) => records.len() as i64,
            Self::Count(count) => *count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExchangeBackend {
    backend: Backend,
    machine: ExchangeStateMachine,
}

impl ExchangeBackend {
    pub fn new(context: Arc<SystemContext>, backend_id: BackendId) -> Result<Self> {
        let backend = context
            .catalog
            .backend(backend_id)
            .cloned()
            .ok_or_else(|| EdiError::NotFound(format!("Backend {backend_id}")))?;
        Ok(Self {
            backend,
            machine: ExchangeStateMachine::new(context),
        })
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn state_machine(&self) -> &ExchangeStateMachine {
        &self.machine
    }

    fn context(&self) -> &SystemContext {
        self.machine.context()
    }

    /// Exchange type this backend uses for a code
    pub fn exchange_type(&self, type_code: &str) -> Result<&ExchangeType> {
        self.context()
            .catalog
            .exchange_type_for_code(&self.backend, type_code)
            .ok_or_else(|| {
                EdiError::NotFound(format!(
                    "Exchange type {type_code} for backend {}",
                    self.backend.name
                ))
            })
    }

    /// Create an exchange record of the given type for this backend
    pub async fn create_record(
        &self,
        type_code: &str,
        values: ExchangeRecordValues,
    ) -> Result<ExchangeRecord> {
        let exchange_type = self.exchange_type(type_code)?;
        let state = if values.awaiting_input {
            if exchange_type.direction != ExchangeDirection::Input {
                return Err(EdiError::InvalidAction(format!(
                    "Exchange type {type_code} is not an input type"
                )));
            }
            ExchangeState::InputPending
        } else {
            ExchangeState::New
        };

        let record = self
            .context()
            .store
            .create(NewExchangeRecord {
                identifier: values.identifier,
                backend_id: self.backend.id,
                type_id: exchange_type.id,
                type_code: exchange_type.code.clone(),
                direction: exchange_type.direction,
                state,
                model: values.model,
                res_id: values.res_id,
            })
            .await?;

        info!(
            backend_id = self.backend.id,
            record_id = record.id,
            identifier = %record.identifier,
            type_code = %record.type_code,
            "Created exchange record"
        );
        Ok(record)
    }

    /// Records of a type on this backend, optionally narrowed by an extra domain
    pub async fn find_existing_exchange_records(
        &self,
        type_code: &str,
        extra: Option<Domain>,
        count_only: bool,
    ) -> Result<ExistingRecords> {
        let exchange_type = self.exchange_type(type_code)?;
        let domain = Domain::equal(Field::BackendId, self.backend.id)
            .and(Domain::equal(Field::TypeId, exchange_type.id))
            .and(extra.unwrap_or(Domain::All));

        let store = &self.context().store;
        if count_only {
            Ok(ExistingRecords::Count(store.count(&domain).await?))
        } else {
            Ok(ExistingRecords::Records(store.search(&domain).await?))
        }
    }

    /// Whether `name` is a lifecycle action that can be triggered on a record
    pub fn is_valid_edi_action(name: &str, raise: bool) -> Result<bool> {
        match ExchangeAction::parse_lifecycle(name) {
            Some(_) => Ok(true),
            None if raise => Err(EdiError::InvalidAction(format!(
                "{name} is not a valid EDI action"
            ))),
            None => Ok(false),
        }
    }

    /// Run a lifecycle action by name on a record of this backend
    pub async fn run_action(
        &self,
        name: &str,
        record_id: RecordId,
        options: CallOptions,
    ) -> Result<ActionOutcome> {
        Self::is_valid_edi_action(name, true)?;
        let action = name
            .parse::<ExchangeAction>()
            .map_err(EdiError::InvalidAction)?;
        self.ensure_owned(record_id).await?;
        self.machine.execute_action(action, record_id, options).await
    }

    pub async fn exchange_generate(
        &self,
        record_id: RecordId,
        options: GenerateOptions,
        call: CallOptions,
    ) -> Result<ActionOutcome> {
        self.ensure_owned(record_id).await?;
        self.machine.generate(record_id, options, call).await
    }

    pub async fn exchange_send(
        &self,
        record_id: RecordId,
        call: CallOptions,
    ) -> Result<ActionOutcome> {
        self.ensure_owned(record_id).await?;
        self.machine.send(record_id, call).await
    }

    pub async fn exchange_receive(
        &self,
        record_id: RecordId,
        call: CallOptions,
    ) -> Result<ActionOutcome> {
        self.ensure_owned(record_id).await?;
        self.machine.receive(record_id, call).await
    }

    pub async fn exchange_process(
        &self,
        record_id: RecordId,
        call: CallOptions,
    ) -> Result<ActionOutcome> {
        self.ensure_owned(record_id).await?;
        self.machine.process(record_id, call).await
    }

    pub async fn exchange_check(
        &self,
        record_id: RecordId,
        call: CallOptions,
    ) -> Result<ActionOutcome> {
        self.ensure_owned(record_id).await?;
        self.machine.check(record_id, call).await
    }

    pub async fn sync_output(&self, options: SyncOutputOptions) -> Result<SyncReport> {
        self.synchronizer().sync_output(self.backend.id, options).await
    }

    pub async fn sync_input(&self, options: SyncInputOptions) -> Result<SyncReport> {
        self.synchronizer().sync_input(self.backend.id, options).await
    }

    fn synchronizer(&self) -> BatchSynchronizer {
        BatchSynchronizer::new(self.machine.context().clone())
    }

    async fn ensure_owned(&self, record_id: RecordId) -> Result<()> {
        let record = self.context().store.get(record_id).await?;
        if record.backend_id != self.backend.id {
            return Err(EdiError::NotFound(format!(
                "Exchange record {record_id} on backend {}",
                self.backend.name
            )));
        }
        Ok(())
    }
}
