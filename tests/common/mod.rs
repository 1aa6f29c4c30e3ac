#![allow(dead_code)]

pub mod handlers;
pub mod strategies;

pub use handlers::*;

use edi_core::config::EdiConfig;
use edi_core::models::{
    Backend, ExchangeCatalog, ExchangeDirection, ExchangeRecord, ExchangeRecordValues,
    ExchangeType, RecordId,
};
use edi_core::orchestration::{ExchangeBackend, InMemoryJobQueue, SystemContext};
use edi_core::registry::{
    CheckOutcome, GeneratedContent, HandlerFactory, HandlerRegistration, HandlerRegistry,
    WorkContext,
};
use edi_core::state_machine::ExchangeStateMachine;
use parking_lot::Mutex;
use std::sync::Arc;

pub const ACME: i64 = 1;
/// Backend that marks sent output as processed
pub const GLOBEX: i64 = 2;

pub const INVOICE_OUT: &str = "INVOICE_OUT";
pub const ORDER_IN: &str = "ORDER_IN";
/// Input type accepting empty files
pub const STATUS_IN: &str = "STATUS_IN";

pub fn demo_catalog() -> ExchangeCatalog {
    let mut catalog = ExchangeCatalog::new();
    catalog
        .add_backend(Backend::new(ACME, "ACME", "demo"))
        .add_backend(Backend::new(GLOBEX, "Globex", "demo").with_auto_process(true))
        .add_exchange_type(
            ExchangeType::new(10, INVOICE_OUT, ExchangeDirection::Output, "demo")
                .with_auto_generate(true),
        )
        .add_exchange_type(ExchangeType::new(
            20,
            ORDER_IN,
            ExchangeDirection::Input,
            "demo",
        ))
        .add_exchange_type(
            ExchangeType::new(21, STATUS_IN, ExchangeDirection::Input, "demo")
                .with_allow_empty_files(true),
        );
    catalog
}

/// Engine wired with scripted handlers for every capability
pub struct Harness {
    pub context: Arc<SystemContext>,
    pub machine: ExchangeStateMachine,
    pub queue: Arc<InMemoryJobQueue>,
    pub notifier: Arc<RecordingNotifier>,
    pub generate: Arc<Script<Option<GeneratedContent>>>,
    pub send: Arc<Script<()>>,
    pub receive: Arc<Script<Option<Vec<u8>>>>,
    pub process: Arc<Script<Option<String>>>,
    pub check: Arc<Script<CheckOutcome>>,
    pub validate: Arc<Script<()>>,
    pub validated: Arc<Mutex<Vec<Option<Vec<u8>>>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(demo_catalog(), EdiConfig::default(), Vec::new())
    }

    /// Harness with extra registrations, registered after the scripted ones
    pub fn with(
        catalog: ExchangeCatalog,
        config: EdiConfig,
        extra: Vec<HandlerRegistration>,
    ) -> Self {
        let generate = Script::new(Some(GeneratedContent::Text(
            "UNH+1+INVOIC:D:96A:UN'".to_string(),
        )));
        let send = Script::new(());
        let receive = Script::new(None);
        let process = Script::new(None);
        let check = Script::new(CheckOutcome::unchanged());
        let validate = Script::new(());
        let validated = Arc::new(Mutex::new(Vec::new()));

        let mut registry = HandlerRegistry::builder();
        {
            let script = generate.clone();
            registry
                .register(HandlerRegistration::new(
                    "scripted_generate",
                    "output.generate",
                    HandlerFactory::generate(move |_ctx: &WorkContext| {
                        ScriptedGenerate(script.clone())
                    }),
                ))
                .unwrap();
        }
        {
            let script = send.clone();
            registry
                .register(HandlerRegistration::new(
                    "scripted_send",
                    "output.send",
                    HandlerFactory::send(move |_ctx: &WorkContext| ScriptedSend(script.clone())),
                ))
                .unwrap();
        }
        {
            let script = receive.clone();
            registry
                .register(HandlerRegistration::new(
                    "scripted_receive",
                    "input.receive",
                    HandlerFactory::receive(move |_ctx: &WorkContext| {
                        ScriptedReceive(script.clone())
                    }),
                ))
                .unwrap();
        }
        {
            let script = process.clone();
            registry
                .register(HandlerRegistration::new(
                    "scripted_process",
                    "input.process",
                    HandlerFactory::process(move |_ctx: &WorkContext| {
                        ScriptedProcess(script.clone())
                    }),
                ))
                .unwrap();
        }
        for usage in ["output.check", "input.check"] {
            let script = check.clone();
            registry
                .register(HandlerRegistration::new(
                    "scripted_check",
                    usage,
                    HandlerFactory::check(move |_ctx: &WorkContext| ScriptedCheck(script.clone())),
                ))
                .unwrap();
        }
        for usage in ["output.validate", "input.validate"] {
            let script = validate.clone();
            let seen = validated.clone();
            registry
                .register(HandlerRegistration::new(
                    "scripted_validate",
                    usage,
                    HandlerFactory::validate(move |_ctx: &WorkContext| ScriptedValidate {
                        script: script.clone(),
                        seen: seen.clone(),
                    }),
                ))
                .unwrap();
        }
        for registration in extra {
            registry.register(registration).unwrap();
        }

        let queue = Arc::new(InMemoryJobQueue::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let context = Arc::new(
            SystemContext::builder()
                .with_config(Arc::new(config))
                .with_catalog(catalog)
                .with_registry(Arc::new(registry.build()))
                .with_notifier(notifier.clone())
                .with_job_queue(queue.clone())
                .build()
                .unwrap(),
        );

        Self {
            machine: ExchangeStateMachine::new(context.clone()),
            context,
            queue,
            notifier,
            generate,
            send,
            receive,
            process,
            check,
            validate,
            validated,
        }
    }

    pub fn backend(&self, backend_id: i64) -> ExchangeBackend {
        ExchangeBackend::new(self.context.clone(), backend_id).unwrap()
    }

    pub async fn create(&self, backend_id: i64, type_code: &str) -> ExchangeRecord {
        self.backend(backend_id)
            .create_record(type_code, ExchangeRecordValues::default())
            .await
            .unwrap()
    }

    /// Input record announced by a partner, waiting to be received
    pub async fn create_pending_input(&self, backend_id: i64, type_code: &str) -> ExchangeRecord {
        self.backend(backend_id)
            .create_record(type_code, ExchangeRecordValues::default().awaiting_input())
            .await
            .unwrap()
    }

    pub async fn record(&self, record_id: RecordId) -> ExchangeRecord {
        self.context.store.get(record_id).await.unwrap()
    }
}
