//! # Handler Registry Infrastructure
//!
//! Capability traits for pluggable handlers, their factories, and the frozen
//! registry the resolver looks them up in.
//!
//! ```text
//! Registry
//! ├── handler           (capability traits, WorkContext, HandlerFactory)
//! └── handler_registry  (registrations, builder, process-wide instance)
//! ```

pub mod handler;
pub mod handler_registry;

pub use handler::{
    CheckHandler, CheckOutcome, GenerateHandler, GeneratedContent, Handler, HandlerFactory,
    ProcessHandler, ReceiveHandler, SendHandler, ValidateHandler, WorkContext,
};
pub use handler_registry::{
    HandlerRegistration, HandlerRegistry, HandlerRegistryBuilder, RegistryStats,
};
