#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # EDI Core
//!
//! Orchestration engine for business-document exchanges (EDI) between an
//! internal system and external trading partners.
//!
//! ## Overview
//!
//! Every exchange is an [`ExchangeRecord`] owned by a backend. The engine moves
//! records through their lifecycle (generate, send, receive, process, check),
//! delegating document formats and transports to pluggable handlers, and keeps
//! track of state and errors per record.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Record states, action guards and the lifecycle actions
//! - [`orchestration`] - Handler resolution, error classification, batch
//!   synchronization, the job collaborator and the backend façade
//! - [`registry`] - Capability traits for handlers and the frozen registry
//! - [`persistence`] - Record store seam, declarative domains, in-memory and
//!   PostgreSQL stores
//! - [`events`] - Notification seam and broadcast publisher
//! - [`models`] - Backends, exchange types, records and the catalog
//! - [`encoding`] - Charset and at-rest encoding of file content
//! - [`config`] - Layered YAML/env configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust
//! use edi_core::models::{
//!     Backend, ExchangeCatalog, ExchangeDirection, ExchangeRecordValues, ExchangeType,
//! };
//! use edi_core::orchestration::{ExchangeBackend, SystemContext};
//! use edi_core::registry::{
//!     GenerateHandler, GeneratedContent, HandlerFactory, HandlerRegistration, HandlerRegistry,
//!     WorkContext,
//! };
//! use edi_core::orchestration::HandlerResult;
//! use edi_core::state_machine::{CallOptions, ExchangeState, GenerateOptions};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct InvoiceWriter;
//!
//! #[async_trait]
//! impl GenerateHandler for InvoiceWriter {
//!     async fn generate(&self, ctx: &WorkContext) -> HandlerResult<Option<GeneratedContent>> {
//!         Ok(Some(format!("UNH+{}+INVOIC:D:96A:UN'", ctx.record.id).into()))
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let mut registry = HandlerRegistry::builder();
//! registry
//!     .register(HandlerRegistration::new(
//!         "invoice_writer",
//!         "output.generate",
//!         HandlerFactory::generate(|_ctx: &WorkContext| InvoiceWriter),
//!     ))
//!     .unwrap();
//!
//! let mut catalog = ExchangeCatalog::new();
//! catalog
//!     .add_backend(Backend::new(1, "ACME", "demo"))
//!     .add_exchange_type(ExchangeType::new(10, "INVOICE_OUT", ExchangeDirection::Output, "demo"));
//!
//! let context = SystemContext::builder()
//!     .with_catalog(catalog)
//!     .with_registry(Arc::new(registry.build()))
//!     .build()
//!     .unwrap();
//! let backend = ExchangeBackend::new(Arc::new(context), 1).unwrap();
//!
//! let record = backend
//!     .create_record("INVOICE_OUT", ExchangeRecordValues::default())
//!     .await
//!     .unwrap();
//! let outcome = backend
//!     .exchange_generate(record.id, GenerateOptions::default(), CallOptions::default())
//!     .await
//!     .unwrap();
//! assert_eq!(outcome.state, ExchangeState::OutputPending);
//! # });
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests
//! ```
//!
//! PostgreSQL store tests are ignored unless run with `--ignored` and a
//! `DATABASE_URL`.

pub mod config;
pub mod constants;
pub mod encoding;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod persistence;
pub mod registry;
pub mod state_machine;

pub use config::{BackoffConfig, ConfigManager, EdiConfig, SyncConfig};
pub use constants::{ExchangeAction, StatusMessage};
pub use error::{EdiError, Result};
pub use events::{EventPublisher, ExchangeNotifier};
pub use models::{Backend, ExchangeCatalog, ExchangeDirection, ExchangeRecord, ExchangeType};
pub use orchestration::{
    BatchSynchronizer, ErrorClassifier, ExchangeBackend, HandlerError, HandlerResolver,
    JobQueue, SystemContext,
};
pub use persistence::{Domain, ExchangeStore};
pub use registry::{HandlerFactory, HandlerRegistration, HandlerRegistry, WorkContext};
pub use state_machine::{
    ActionOutcome, CallOptions, ExchangeState, ExchangeStateMachine, GenerateOptions,
};
